//! Per-job directory layout under the working root.
//!
//! `<work>/<job_id>/{state.json, meta.json, media/, transcripts/, artifacts/, _stages/}`

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JobPaths {
    pub root: PathBuf,
}

impl JobPaths {
    pub fn new(work_root: &Path, job_id: &str) -> Self {
        Self { root: work_root.join(job_id) }
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn meta_file(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.root.join("media")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.root.join("transcripts")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn stages_dir(&self) -> PathBuf {
        self.root.join("_stages")
    }

    pub fn stage_detail_file(&self, stage: crate::error::StageName) -> PathBuf {
        self.stages_dir().join(format!("{stage}.json"))
    }

    pub fn trash_dir(&self, timestamp: &str) -> PathBuf {
        self.stages_dir().join("trash").join(timestamp)
    }

    pub fn ingest_file(&self) -> PathBuf {
        self.root.join("ingest.json")
    }

    pub fn raw_transcript_file(&self) -> PathBuf {
        self.root.join("raw_transcript.json")
    }

    pub fn enriched_context_file(&self) -> PathBuf {
        self.root.join("enriched_context.json")
    }

    /// Directories that must exist before any stage writes into the job.
    pub fn scaffold_dirs(&self) -> [PathBuf; 4] {
        [self.media_dir(), self.transcripts_dir(), self.artifacts_dir(), self.stages_dir()]
    }
}
