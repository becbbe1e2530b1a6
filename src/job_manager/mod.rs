//! Job lifecycle operations atop the job store and pipeline driver (§2): the
//! thing the CLI actually talks to.

pub mod cleanup;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::Configuration;
use crate::error::StageName;
use crate::pipeline::{PipelineDriver, RunOutcome};
use crate::store::{Job, JobFilter, JobStore};
use crate::Result;

pub struct JobManager {
    store: Arc<dyn JobStore>,
    driver: PipelineDriver,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>, driver: PipelineDriver) -> Self {
        Self { store, driver }
    }

    pub async fn run(
        &self,
        source: &str,
        configuration: Configuration,
        stop_after: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<(Job, RunOutcome)> {
        self.driver.run(source, configuration, stop_after, cancel).await
    }

    pub async fn continue_stage(
        &self,
        job_id: Option<&str>,
        from_stage: StageName,
        stop_after: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<(Job, RunOutcome)> {
        let job = self.resolve_job(job_id).await?;
        self.driver.continue_job(job, from_stage, stop_after, cancel).await
    }

    pub async fn retry(
        &self,
        job_id: &str,
        from_stage: Option<StageName>,
        cancel: CancellationToken,
    ) -> Result<(Job, RunOutcome)> {
        let job = self.store.load(job_id).await?;
        self.driver.retry(job, from_stage, None, cancel).await
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.store.list(filter).await
    }

    pub async fn show(&self, job_id: &str) -> Result<Job> {
        self.store.load(job_id).await
    }

    pub async fn delete(&self, job_id: &str) -> Result<()> {
        let job = self.store.load(job_id).await?;
        self.store.delete(&job).await
    }

    /// `jobs finalize <id>`: re-run SHELVE in isolation on an already
    /// GENERATE-complete job, without resetting earlier stages.
    pub async fn finalize(&self, job_id: &str, cancel: CancellationToken) -> Result<(Job, RunOutcome)> {
        let job = self.store.load(job_id).await?;
        self.driver.continue_job(job, StageName::Shelve, None, cancel).await
    }

    async fn resolve_job(&self, job_id: Option<&str>) -> Result<Job> {
        match job_id {
            Some(id) => self.store.load(id).await,
            None => self.store.latest(None).await?.ok_or_else(|| crate::Error::JobNotFound("no jobs in working root".to_string())),
        }
    }
}
