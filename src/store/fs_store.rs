//! Filesystem-backed [`JobStore`] implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::{Configuration, JobMeta, JobState, JobStatus, ProcessingTotals};
use crate::domain::ids::{new_job_id, slugify};
use crate::error::StageName;
use crate::store::atomic::{path_exists_nonempty, read_json_retrying, write_json_atomic};
use crate::store::layout::JobPaths;
use crate::store::{Job, JobFilter, JobStore};
use crate::Result;

pub struct FsJobStore {
    work_root: PathBuf,
}

impl FsJobStore {
    pub fn new(work_root: impl Into<PathBuf>) -> Self {
        Self { work_root: work_root.into() }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    async fn load_from_paths(&self, job_id: &str, paths: JobPaths) -> Result<Job> {
        let state = match read_json_retrying::<JobState>(&paths.state_file()).await {
            Ok(state) => state,
            Err(err) => {
                warn!(job_id, error = %err, "state.json unreadable, reconstructing from _stages/");
                reconstruct_state(&paths).await
            }
        };
        let meta: JobMeta = read_json_retrying(&paths.meta_file()).await?;
        Ok(Job { id: job_id.to_string(), paths, state, meta })
    }
}

/// Best-effort reconstruction when `state.json` is corrupt: read whatever
/// `_stages/<stage>.json` detail files exist to recover stage statuses,
/// otherwise report the job as `Failed` per §4.1.
async fn reconstruct_state(paths: &JobPaths) -> JobState {
    let now = Utc::now();
    let mut state = JobState::new(now);
    let mut any_detail = false;
    for stage in StageName::ORDER {
        let detail_path = paths.stage_detail_file(stage);
        if path_exists_nonempty(&detail_path).await {
            any_detail = true;
            state.complete_stage(stage, now);
        }
    }
    if !any_detail {
        state.status = JobStatus::Failed;
    }
    state
}

#[async_trait]
impl JobStore for FsJobStore {
    async fn create(&self, source: &str, configuration: Configuration, now: DateTime<Utc>) -> Result<Job> {
        let stem = Path::new(source)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("job");
        let job_id = new_job_id(now, &slugify(stem));
        let paths = JobPaths::new(&self.work_root, &job_id);
        for dir in paths.scaffold_dirs() {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| crate::Error::io_path("creating job directory", dir, e))?;
        }
        let state = JobState::new(now);
        let meta = JobMeta {
            job_id: job_id.clone(),
            source: source.to_string(),
            configuration,
            processing: ProcessingTotals::default(),
        };
        write_json_atomic(&paths.state_file(), &state).await?;
        write_json_atomic(&paths.meta_file(), &meta).await?;
        debug!(job_id, "created job");
        Ok(Job { id: job_id, paths, state, meta })
    }

    async fn load(&self, job_id: &str) -> Result<Job> {
        let paths = JobPaths::new(&self.work_root, job_id);
        if !paths.root.is_dir() {
            return Err(crate::Error::not_found(job_id));
        }
        self.load_from_paths(job_id, paths).await
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut out = Vec::new();
        if !self.work_root.is_dir() {
            return Ok(out);
        }
        let mut entries = tokio::fs::read_dir(&self.work_root)
            .await
            .map_err(|e| crate::Error::io_path("listing work root", &self.work_root, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| crate::Error::io_path("reading directory entry", &self.work_root, e))?
        {
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let job_id = entry.file_name().to_string_lossy().to_string();
            let paths = JobPaths::new(&self.work_root, &job_id);
            match self.load_from_paths(&job_id, paths).await {
                Ok(job) => {
                    if job_matches(&job, filter) {
                        out.push(job);
                    }
                }
                Err(err) => warn!(job_id, error = %err, "skipping unreadable job"),
            }
        }
        out.sort_by_key(|j| j.updated_at());
        Ok(out)
    }

    async fn save(&self, job: &Job) -> Result<()> {
        write_json_atomic(&job.paths.state_file(), &job.state).await?;
        write_json_atomic(&job.paths.meta_file(), &job.meta).await?;
        Ok(())
    }

    async fn delete(&self, job: &Job) -> Result<()> {
        if job.paths.root.is_dir() {
            tokio::fs::remove_dir_all(&job.paths.root)
                .await
                .map_err(|e| crate::Error::io_path("deleting job directory", &job.paths.root, e))?;
        }
        Ok(())
    }

    async fn latest(&self, provider_capable: Option<&[String]>) -> Result<Option<Job>> {
        let jobs = self.list(&JobFilter::default()).await?;
        Ok(jobs
            .into_iter()
            .filter(|job| match provider_capable {
                Some(names) => names.iter().any(|name| job.uses_provider(name)),
                None => true,
            })
            .max_by_key(|job| job.updated_at()))
    }

    async fn write_stage_detail(&self, job: &Job, stage: StageName, detail: &serde_json::Value) -> Result<()> {
        write_json_atomic(&job.paths.stage_detail_file(stage), detail).await
    }
}

fn job_matches(job: &Job, filter: &JobFilter) -> bool {
    if let Some(status) = filter.status {
        if std::mem::discriminant(&job.status()) != std::mem::discriminant(&status) {
            return false;
        }
    }
    if let Some(since) = filter.since {
        if job.updated_at() < since {
            return false;
        }
    }
    true
}
