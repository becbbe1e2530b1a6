//! Retention-based background cleanup, modeled on the same
//! running-flag-bounded periodic scheduler shape as the reference
//! implementation's database maintenance scheduler, but sweeping terminal
//! job directories on the filesystem instead of vacuuming a database (§5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::JobStatus;
use crate::store::{JobFilter, JobStore};
use crate::Result;

#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    pub failed_jobs_retention_days: i64,
    pub completed_jobs_retention_days: i64,
    pub tick_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            failed_jobs_retention_days: 7,
            completed_jobs_retention_days: 30,
            tick_interval: Duration::from_secs(60 * 60),
        }
    }
}

pub struct CleanupScheduler {
    store: Arc<dyn JobStore>,
    config: RetentionConfig,
    running: Arc<AtomicBool>,
}

impl CleanupScheduler {
    pub fn new(store: Arc<dyn JobStore>, config: RetentionConfig) -> Self {
        Self { store, config, running: Arc::new(AtomicBool::new(false)) }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.running.store(true, Ordering::SeqCst);
            let mut interval = tokio::time::interval(scheduler.config.tick_interval);
            while scheduler.running.load(Ordering::SeqCst) {
                interval.tick().await;
                match scheduler.sweep().await {
                    Ok(reclaimed) if !reclaimed.is_empty() => {
                        info!(count = reclaimed.len(), "reclaimed terminal jobs past retention");
                    }
                    Ok(_) => debug!("cleanup tick found nothing past retention"),
                    Err(err) => warn!(error = %err, "cleanup sweep failed"),
                }
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One sweep of the working root; idempotent, safe alongside active
    /// drivers because it only considers jobs whose state is terminal.
    pub async fn sweep(&self) -> Result<Vec<String>> {
        let now = Utc::now();
        let jobs = self.store.list(&JobFilter::default()).await?;
        let mut reclaimed = Vec::new();
        for job in jobs {
            let age_days = (now - job.updated_at()).num_days();
            let past_retention = match job.status() {
                JobStatus::Failed => age_days >= self.config.failed_jobs_retention_days,
                JobStatus::Completed => age_days >= self.config.completed_jobs_retention_days,
                JobStatus::Created | JobStatus::Running => false,
            };
            if past_retention {
                self.store.delete(&job).await?;
                reclaimed.push(job.id.clone());
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactSpec, CompressionMode, Configuration, LanguageHint, ProviderChoice, ShelveMode};
    use crate::store::FsJobStore;

    fn test_config() -> Configuration {
        Configuration {
            transcription: ProviderChoice { provider: "local".into(), model: "base".into() },
            refinement: ProviderChoice { provider: "local".into(), model: "base".into() },
            compression_mode: CompressionMode::Compressed,
            language_hint: LanguageHint::Auto,
            artifacts: vec![ArtifactSpec { plugin: "markdown".into(), template: "summary".into(), filename_override: None }],
            shelve_mode: ShelveMode::Timeline,
            skip_transcript: false,
            debug: false,
        }
    }

    #[tokio::test]
    async fn sweep_reclaims_only_jobs_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn JobStore> = Arc::new(FsJobStore::new(dir.path()));

        let old_time = Utc::now() - chrono::Duration::days(10);
        let mut stale = store.create("stale.mp3", test_config(), old_time).await.unwrap();
        stale.state.fail_stage(crate::error::StageName::Ingest, "boom", old_time);
        store.save(&stale).await.unwrap();

        let fresh = store.create("fresh.mp3", test_config(), Utc::now()).await.unwrap();

        let scheduler = CleanupScheduler::new(store.clone(), RetentionConfig { failed_jobs_retention_days: 1, ..Default::default() });
        let reclaimed = scheduler.sweep().await.unwrap();

        assert_eq!(reclaimed, vec![stale.id.clone()]);
        assert!(store.load(&fresh.id).await.is_ok());
        assert!(store.load(&stale.id).await.is_err());
    }
}
