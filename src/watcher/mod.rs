//! Input directory watcher (§4.6): polls `input_dir` for files whose size
//! has been stable across two consecutive ticks, then hands each off to the
//! pipeline driver one at a time. Modeled on the same running-flag-bounded
//! tick loop as [`crate::job_manager::cleanup::CleanupScheduler`]; polling
//! rather than a native filesystem-event crate because nothing in the
//! dependency stack pulls one in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::Configuration;
use crate::error::StageName;
use crate::pipeline::PipelineDriver;
use crate::store::JobStore;
use crate::Result;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub input_dir: PathBuf,
    pub poll_interval: Duration,
    pub default_configuration: Configuration,
}

/// Tracks the last observed size of a candidate file between polls, so a
/// file mid-copy isn't picked up before it's stable.
struct Candidate {
    last_size: u64,
    stable_ticks: u32,
}

const STABLE_TICKS_REQUIRED: u32 = 2;

pub struct Watcher {
    store: Arc<dyn JobStore>,
    driver: PipelineDriver,
    config: WatcherConfig,
    running: Arc<AtomicBool>,
}

impl Watcher {
    pub fn new(store: Arc<dyn JobStore>, driver: PipelineDriver, config: WatcherConfig) -> Self {
        Self { store, driver, config, running: Arc::new(AtomicBool::new(false)) }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Runs until `cancel` fires. A single pipeline runs to completion
    /// before the next candidate is picked up (§4.6: "at most one pipeline
    /// runs at a time per watcher instance").
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let mut candidates: HashMap<PathBuf, Candidate> = HashMap::new();
        let mut interval = tokio::time::interval(self.config.poll_interval);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("watcher received cancellation");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.poll_once(&mut candidates, &cancel).await {
                        warn!(error = %err, "watcher poll failed");
                    }
                }
            }
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn poll_once(&self, candidates: &mut HashMap<PathBuf, Candidate>, cancel: &CancellationToken) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.config.input_dir).await {
            Ok(entries) => entries,
            Err(e) => return Err(crate::Error::io_path("reading input directory", &self.config.input_dir, e)),
        };

        let mut seen = std::collections::HashSet::new();
        let mut ready = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| crate::Error::io_path("reading input directory", &self.config.input_dir, e))? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            seen.insert(path.clone());

            let candidate = candidates.entry(path.clone()).or_insert(Candidate { last_size: size, stable_ticks: 0 });
            if candidate.last_size == size {
                candidate.stable_ticks += 1;
            } else {
                candidate.last_size = size;
                candidate.stable_ticks = 0;
            }
            if candidate.stable_ticks >= STABLE_TICKS_REQUIRED {
                ready.push(path);
            }
        }
        candidates.retain(|path, _| seen.contains(path));

        for path in ready {
            candidates.remove(&path);
            if let Err(err) = self.ingest_one(&path, cancel.clone()).await {
                error!(path = %path.display(), error = %err, "watcher failed to hand off candidate");
            }
        }
        Ok(())
    }

    /// Creates the job, copies the stable file into its `media/`, deletes
    /// the source unconditionally once the copy succeeds, then runs the
    /// full pipeline against the copied path. A failed copy aborts before
    /// the source is touched and leaves the job `Failed` at INGEST.
    async fn ingest_one(&self, path: &std::path::Path, cancel: CancellationToken) -> Result<()> {
        let source_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown").to_string();
        info!(source = %source_name, "watcher picked up stable file");

        self.driver.validate_schema(&self.config.default_configuration)?;
        let mut job = self.store.create(&source_name, self.config.default_configuration.clone(), chrono::Utc::now()).await?;

        let media_dir = job.paths.media_dir();
        let dest = media_dir.join("source").with_extension(path.extension().unwrap_or_default());
        if let Err(copy_err) = tokio::fs::copy(path, &dest).await {
            let err = crate::Error::io_path("copying watched source into job", path, copy_err);
            job.state.fail_stage(StageName::Ingest, err.to_string(), chrono::Utc::now());
            self.store.save(&job).await?;
            return Err(err);
        }
        tokio::fs::remove_file(path).await.map_err(|e| crate::Error::io_path("deleting watched source after copy", path, e))?;

        job.meta.source = dest.to_string_lossy().into_owned();
        self.store.save(&job).await?;

        let (job, outcome) = self.driver.run_existing(job, StageName::Ingest, None, cancel).await?;
        if outcome.job_finalized {
            info!(job_id = %job.id, "watcher-driven job finalized");
        } else if let Some(stage) = outcome.halted_at {
            warn!(job_id = %job.id, %stage, "watcher-driven job halted");
        }
        Ok(())
    }
}
