//! Mechanical prerequisite checks per stage (§4.2).

use crate::error::{Error, PrerequisiteCause, StageName};
use crate::store::{atomic::path_exists_nonempty, Job};
use crate::Result;

pub async fn validate(job: &Job, stage: StageName) -> Result<()> {
    match stage {
        StageName::Ingest => {
            let source = std::path::Path::new(&job.meta.source);
            match tokio::fs::metadata(source).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
                Ok(_) => Err(Error::prerequisite(stage, PrerequisiteCause::FileEmpty)),
                Err(_) => Err(Error::prerequisite(stage, PrerequisiteCause::FileMissing)),
            }
        }
        StageName::Scribe => {
            if !path_exists_nonempty(&job.paths.ingest_file()).await {
                return Err(Error::prerequisite(stage, PrerequisiteCause::MissingIngest));
            }
            Ok(())
        }
        StageName::Refine => {
            let has_transcript = path_exists_nonempty(&job.paths.raw_transcript_file()).await;
            let has_ingest = path_exists_nonempty(&job.paths.ingest_file()).await;
            let direct_mode = job.meta.configuration.skip_transcript;
            if has_transcript || (direct_mode && has_ingest) {
                Ok(())
            } else {
                Err(Error::prerequisite(stage, PrerequisiteCause::MissingRefineInput))
            }
        }
        StageName::Generate => {
            if !path_exists_nonempty(&job.paths.enriched_context_file()).await {
                return Err(Error::prerequisite(stage, PrerequisiteCause::MissingContext));
            }
            Ok(())
        }
        StageName::Shelve => {
            let mut entries = tokio::fs::read_dir(job.paths.artifacts_dir())
                .await
                .map_err(|e| Error::io_path("reading artifacts directory", job.paths.artifacts_dir(), e))?;
            let mut any = false;
            while let Some(entry) =
                entries.next_entry().await.map_err(|e| Error::io_path("reading artifacts entry", job.paths.artifacts_dir(), e))?
            {
                if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                    any = true;
                    break;
                }
            }
            if any {
                Ok(())
            } else {
                Err(Error::prerequisite(stage, PrerequisiteCause::NoArtifacts))
            }
        }
    }
}
