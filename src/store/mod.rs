//! The job store: persists per-job state and metadata on the filesystem.
//!
//! Contract: `create`, `load`, `list`, `save`, `delete`, `latest`. Every job
//! owns a disjoint directory, so independent drivers can run concurrently
//! against distinct jobs; `state.json` is the only shared mutable object and
//! is guarded by atomic rename (`crate::store::atomic`).

pub mod atomic;
pub mod fs_store;
pub mod layout;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Configuration, JobMeta, JobState, JobStatus};
use crate::error::StageName;
use crate::Result;

pub use fs_store::FsJobStore;
pub use layout::JobPaths;

/// An in-memory handle to a job: its paths plus its currently-loaded state
/// and metadata. Callers mutate `state`/`meta` and call `JobStore::save` to
/// persist; the store never mutates a `Job` behind the caller's back.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub paths: JobPaths,
    pub state: JobState,
    pub meta: JobMeta,
}

impl Job {
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.state.updated_at
    }

    pub fn status(&self) -> JobStatus {
        self.state.status
    }

    /// Capability filter for `latest`: does this job's configuration touch the
    /// given transcription or refinement provider name?
    pub fn uses_provider(&self, provider: &str) -> bool {
        self.meta.configuration.transcription.provider == provider
            || self.meta.configuration.refinement.provider == provider
    }
}

/// Filter applied by `JobStore::list` / `jobs list --status --since`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub since: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, source: &str, configuration: Configuration, now: DateTime<Utc>) -> Result<Job>;
    async fn load(&self, job_id: &str) -> Result<Job>;
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;
    async fn save(&self, job: &Job) -> Result<()>;
    async fn delete(&self, job: &Job) -> Result<()>;
    /// The job with the most recent `updated_at`, optionally restricted to
    /// jobs whose configuration uses a provider with the given capability.
    async fn latest(&self, provider_capable: Option<&[String]>) -> Result<Option<Job>>;

    /// Record a stage's detail payload under `_stages/<stage>.json`.
    async fn write_stage_detail(&self, job: &Job, stage: StageName, detail: &serde_json::Value) -> Result<()>;
}
