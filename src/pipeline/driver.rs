//! Stage-sequencing orchestration (§4.2): `run`, `continue_job`, `retry`.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::{Configuration, EnrichedContext, IngestResult, Transcript};
use crate::error::StageName;
use crate::store::Job;
use crate::templates::assemble_schema;
use crate::Result;

use super::{prerequisites, stages, PipelineContext};

async fn dir_has_entries(dir: &std::path::Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => entries.next_entry().await.ok().flatten().is_some(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub job_finalized: bool,
    pub halted_at: Option<StageName>,
}

pub struct PipelineDriver {
    ctx: PipelineContext,
}

impl PipelineDriver {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn run(
        &self,
        source: &str,
        configuration: Configuration,
        stop_after: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<(Job, RunOutcome)> {
        self.validate_schema(&configuration)?;
        let mut job = self.ctx.store.create(source, configuration, Utc::now()).await?;
        let outcome = self.execute_from(&mut job, StageName::Ingest, stop_after, cancel).await?;
        Ok((job, outcome))
    }

    /// Fails fast on a schema conflict across the configured artifact list
    /// before any job directory is created (§8 scenario 6): REFINE would
    /// otherwise be the first place this surfaces, deep into a job that's
    /// already occupying a working directory.
    pub fn validate_schema(&self, configuration: &Configuration) -> Result<()> {
        let schemas: Vec<_> = configuration
            .artifacts
            .iter()
            .filter_map(|spec| self.ctx.templates.get(&spec.plugin, &spec.template).ok())
            .map(|def| &def.schema)
            .collect();
        assemble_schema(schemas)?;
        Ok(())
    }

    /// Reset `from_stage` and every later stage to `Pending`, moving its
    /// artifacts to `_stages/trash/<timestamp>/` when debug is set rather
    /// than deleting them, then execute from there.
    pub async fn continue_job(
        &self,
        mut job: Job,
        from_stage: StageName,
        stop_after: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<(Job, RunOutcome)> {
        self.reset_downstream(&mut job, from_stage).await?;
        let outcome = self.execute_from(&mut job, from_stage, stop_after, cancel).await?;
        Ok((job, outcome))
    }

    /// Executes an already-created job from `from_stage` without resetting
    /// any directory first. Used when the caller (the watcher) has just
    /// populated the job's owned directories itself and a reset would
    /// destroy what it just wrote.
    pub async fn run_existing(
        &self,
        mut job: Job,
        from_stage: StageName,
        stop_after: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<(Job, RunOutcome)> {
        let outcome = self.execute_from(&mut job, from_stage, stop_after, cancel).await?;
        Ok((job, outcome))
    }

    pub async fn retry(
        &self,
        job: Job,
        from_stage: Option<StageName>,
        stop_after: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<(Job, RunOutcome)> {
        let from_stage = from_stage.unwrap_or_else(|| job.state.first_incomplete_stage());
        self.continue_job(job, from_stage, stop_after, cancel).await
    }

    /// Only the directories owned by a stage being re-executed are cleared:
    /// INGEST owns `media/`, SCRIBE owns `transcripts/`, GENERATE owns
    /// `artifacts/`; SHELVE owns none of them, so re-running it alone (e.g.
    /// `jobs finalize`) leaves earlier stages' artifacts untouched.
    async fn reset_downstream(&self, job: &mut Job, from_stage: StageName) -> Result<()> {
        let now = Utc::now();
        let mut owned_dirs = Vec::new();
        if from_stage.index() <= StageName::Ingest.index() {
            owned_dirs.push(job.paths.media_dir());
        }
        if from_stage.index() <= StageName::Scribe.index() {
            owned_dirs.push(job.paths.transcripts_dir());
        }
        if from_stage.index() <= StageName::Generate.index() {
            owned_dirs.push(job.paths.artifacts_dir());
        }

        if job.meta.configuration.debug && !owned_dirs.is_empty() {
            let timestamp = now.format("%Y%m%dT%H%M%S").to_string();
            let trash = job.paths.trash_dir(&timestamp);
            tokio::fs::create_dir_all(&trash).await.map_err(|e| crate::Error::io_path("creating trash directory", &trash, e))?;
            for dir in owned_dirs {
                if dir_has_entries(&dir).await {
                    let dest = trash.join(dir.file_name().expect("dir has a name"));
                    let _ = tokio::fs::rename(&dir, &dest).await;
                    let _ = tokio::fs::create_dir_all(&dir).await;
                }
            }
        }
        job.state.reset_from(from_stage, now);
        self.ctx.store.save(job).await?;
        Ok(())
    }

    async fn execute_from(
        &self,
        job: &mut Job,
        from_stage: StageName,
        stop_after: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        let stop_after = stop_after.unwrap_or(StageName::Shelve);
        let mut ingest_result: Option<IngestResult> = None;
        let mut transcript: Option<Transcript> = None;
        let mut context: Option<EnrichedContext> = None;

        for stage in &StageName::ORDER[from_stage.index()..] {
            let stage = *stage;
            if let Err(err) = prerequisites::validate(job, stage).await {
                job.state.fail_stage(stage, err.to_string(), Utc::now());
                self.ctx.store.save(job).await?;
                error!(job_id = %job.id, %stage, error = %err, "prerequisite not satisfied");
                return Ok(RunOutcome { job_finalized: false, halted_at: Some(stage) });
            }

            job.state.begin_stage(stage, Utc::now());
            self.ctx.store.save(job).await?;
            info!(job_id = %job.id, %stage, "stage started");

            let result = self.run_one(job, stage, &mut ingest_result, &mut transcript, &mut context, cancel.clone()).await;
            match result {
                Ok(()) => {
                    if job.state.record(stage).status != crate::domain::StageStatus::Skipped {
                        job.state.complete_stage(stage, Utc::now());
                    }
                    self.ctx.store.save(job).await?;
                    info!(job_id = %job.id, %stage, "stage completed");
                }
                Err(err) => {
                    job.state.fail_stage(stage, err.to_string(), Utc::now());
                    self.ctx.store.save(job).await?;
                    error!(job_id = %job.id, %stage, error = %err, "stage failed");
                    return Ok(RunOutcome { job_finalized: false, halted_at: Some(stage) });
                }
            }

            if stage == stop_after {
                return Ok(RunOutcome { job_finalized: stage == StageName::Shelve, halted_at: None });
            }
        }

        Ok(RunOutcome { job_finalized: true, halted_at: None })
    }

    async fn run_one(
        &self,
        job: &mut Job,
        stage: StageName,
        ingest_result: &mut Option<IngestResult>,
        transcript: &mut Option<Transcript>,
        context: &mut Option<EnrichedContext>,
        cancel: CancellationToken,
    ) -> Result<()> {
        match stage {
            StageName::Ingest => {
                let result = stages::ingest::run(&self.ctx, job, cancel).await?;
                *ingest_result = Some(result);
                Ok(())
            }
            StageName::Scribe => {
                if job.meta.configuration.skip_transcript {
                    job.state.skip_stage(stage, "skip_transcript is set", Utc::now());
                    return Ok(());
                }
                let ingest = self.load_ingest_if_needed(job, ingest_result).await?;
                let (parsed, usage) = stages::scribe::run(&self.ctx, job, ingest, cancel).await?;
                job.meta.processing.accumulate(&usage);
                self.ctx.store.write_stage_detail(job, stage, &serde_json::to_value(&usage)?).await?;
                *transcript = Some(parsed);
                Ok(())
            }
            StageName::Refine => {
                self.load_transcript_if_needed(job, transcript).await?;
                let ingest = self.load_ingest_if_needed(job, ingest_result).await?;
                let (parsed, usage) = stages::refine::run(&self.ctx, job, ingest, transcript.as_ref(), cancel).await?;
                job.meta.processing.accumulate(&usage);
                self.ctx.store.write_stage_detail(job, stage, &serde_json::to_value(&usage)?).await?;
                *context = Some(parsed);
                Ok(())
            }
            StageName::Generate => {
                self.load_transcript_if_needed(job, transcript).await?;
                let context = self.load_context_if_needed(job, context).await?;
                let skipped = stages::generate::run(&self.ctx, job, context, transcript.as_ref()).await?;
                if !skipped.is_empty() {
                    self.ctx.store.write_stage_detail(job, stage, &serde_json::to_value(&skipped)?).await?;
                }
                Ok(())
            }
            StageName::Shelve => {
                stages::shelve::run(&self.ctx, job).await?;
                Ok(())
            }
        }
    }

    async fn load_ingest_if_needed<'a>(
        &self,
        job: &Job,
        ingest_result: &'a mut Option<IngestResult>,
    ) -> Result<&'a IngestResult> {
        if ingest_result.is_none() {
            let bytes = tokio::fs::read(job.paths.ingest_file())
                .await
                .map_err(|e| crate::Error::io_path("reading ingest.json", job.paths.ingest_file(), e))?;
            *ingest_result = Some(serde_json::from_slice(&bytes)?);
        }
        Ok(ingest_result.as_ref().expect("just populated"))
    }

    /// Reloads the raw transcript from disk when REFINE or GENERATE run in a
    /// call that didn't just produce it itself (continuing or retrying from
    /// one of those stages directly): without this, a job with a completed
    /// SCRIBE stage would be refined in direct (audio-handle) mode by
    /// accident, since `transcript` starts `None` in every fresh
    /// `execute_from` call.
    async fn load_transcript_if_needed(&self, job: &Job, transcript: &mut Option<Transcript>) -> Result<()> {
        if transcript.is_some() || job.meta.configuration.skip_transcript {
            return Ok(());
        }
        let path = job.paths.raw_transcript_file();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        let bytes = tokio::fs::read(&path).await.map_err(|e| crate::Error::io_path("reading raw_transcript.json", &path, e))?;
        *transcript = Some(serde_json::from_slice(&bytes)?);
        Ok(())
    }

    async fn load_context_if_needed<'a>(
        &self,
        job: &Job,
        context: &'a mut Option<EnrichedContext>,
    ) -> Result<&'a EnrichedContext> {
        if context.is_none() {
            let bytes = tokio::fs::read(job.paths.enriched_context_file())
                .await
                .map_err(|e| crate::Error::io_path("reading enriched_context.json", job.paths.enriched_context_file(), e))?;
            *context = Some(serde_json::from_slice(&bytes)?);
        }
        Ok(context.as_ref().expect("just populated"))
    }
}
