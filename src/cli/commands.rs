//! Dispatch from parsed [`super::args::Command`] onto [`JobManager`],
//! [`PipelineDriver`], the watcher, and the cost reporter.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::args::{Cli, Command, ContinueArgs, JobsCommand, RunOverrides};
use crate::config::ProcessConfig;
use crate::domain::{ArtifactSpec, Configuration, JobStatus, LanguageHint};
use crate::error::StageName;
use crate::job_manager::cleanup::{CleanupScheduler, RetentionConfig};
use crate::job_manager::JobManager;
use crate::pipeline::media::FfmpegMediaTool;
use crate::pipeline::{PipelineContext, PipelineDriver, RunOutcome};
use crate::plugins::PluginRegistry;
use crate::providers::ProviderRegistry;
use crate::store::{FsJobStore, JobFilter, JobStore};
use crate::templates::TemplateRegistry;
use crate::{cost, Error, Result};

/// Everything needed to build a [`PipelineContext`]; assembled once in
/// `main` and threaded through every command.
pub struct AppContext {
    pub config: ProcessConfig,
    pub store: Arc<dyn JobStore>,
    pub manager: JobManager,
}

pub async fn build_context(config: ProcessConfig) -> Result<AppContext> {
    config.validate()?;
    let store: Arc<dyn JobStore> = Arc::new(FsJobStore::new(&config.work_root));
    let providers = Arc::new(ProviderRegistry::discover(&config.providers_root).await?);
    let templates = Arc::new(TemplateRegistry::discover(&config.templates_root)?);
    let plugins = Arc::new(PluginRegistry::with_reference_plugins());
    let media_tool = Arc::new(FfmpegMediaTool::default());

    let ctx = PipelineContext {
        store: store.clone(),
        providers,
        templates,
        plugins,
        media_tool,
        results_root: config.results_root.clone(),
    };
    let driver = PipelineDriver::new(ctx);
    let manager = JobManager::new(store.clone(), driver);
    Ok(AppContext { config, store, manager })
}

/// Runs the parsed command to completion, returning the process exit code
/// per the CLI contract (0 success, 1 user error, 2 internal failure, §6).
pub async fn run(cli: Cli, app: AppContext, cancel: CancellationToken) -> i32 {
    let outcome = dispatch(cli.command, &app, cancel).await;
    match outcome {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command, app: &AppContext, cancel: CancellationToken) -> Result<()> {
    match command {
        Command::Run { source, overrides } => {
            let configuration = build_configuration(&app.config, &overrides);
            let (job, outcome) = app.manager.run(&source, configuration, overrides.stop_after, cancel).await?;
            report_outcome(&job.id, outcome);
            Ok(())
        }
        Command::Ingest(args) => continue_from(app, args, StageName::Ingest, cancel).await,
        Command::Scribe(args) => continue_from(app, args, StageName::Scribe, cancel).await,
        Command::Refine(args) => continue_from(app, args, StageName::Refine, cancel).await,
        Command::Generate(args) => continue_from(app, args, StageName::Generate, cancel).await,
        Command::Shelve(args) => continue_from(app, args, StageName::Shelve, cancel).await,
        Command::Jobs(jobs_command) => dispatch_jobs(jobs_command, app, cancel).await,
        Command::Watch => run_watcher(app, cancel).await,
        Command::Report { days } => print_report(app, days).await,
        Command::Setup => Err(Error::Other("`setup` is out of scope for this build".to_string())),
    }
}

async fn continue_from(app: &AppContext, args: ContinueArgs, stage: StageName, cancel: CancellationToken) -> Result<()> {
    let (job, outcome) = app.manager.continue_stage(args.job_id.as_deref(), stage, args.stop_after, cancel).await?;
    report_outcome(&job.id, outcome);
    Ok(())
}

fn report_outcome(job_id: &str, outcome: RunOutcome) {
    if outcome.job_finalized {
        println!("{job_id}: finalized");
    } else if let Some(stage) = outcome.halted_at {
        println!("{job_id}: halted at {stage}");
    } else {
        println!("{job_id}: stopped as requested");
    }
}

async fn dispatch_jobs(command: JobsCommand, app: &AppContext, cancel: CancellationToken) -> Result<()> {
    match command {
        JobsCommand::List { status, since } => {
            let filter = JobFilter { status: status.as_deref().map(parse_job_status).transpose()?, since };
            let jobs = app.manager.list(&filter).await?;
            for job in jobs {
                println!("{}\t{:?}\t{}", job.id, job.status(), job.updated_at().to_rfc3339());
            }
            Ok(())
        }
        JobsCommand::Show { job_id } => {
            let job = app.manager.show(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&job.state)?);
            println!("{}", serde_json::to_string_pretty(&job.meta)?);
            Ok(())
        }
        JobsCommand::Retry { job_id, from_stage } => {
            let (job, outcome) = app.manager.retry(&job_id, from_stage, cancel).await?;
            report_outcome(&job.id, outcome);
            Ok(())
        }
        JobsCommand::Cleanup { older_than, status } => {
            // `--older-than`/`--status` is an exact ad hoc filter, distinct from
            // CleanupScheduler's per-status retention-category defaults used by
            // the background sweep (§5); reuse it only when neither is given.
            let reclaimed = if older_than.is_none() && status.is_none() {
                let retention = RetentionConfig {
                    failed_jobs_retention_days: app.config.failed_jobs_retention_days,
                    completed_jobs_retention_days: app.config.completed_jobs_retention_days,
                    tick_interval: std::time::Duration::from_secs(3600),
                };
                CleanupScheduler::new(app.store.clone(), retention).sweep().await?
            } else {
                let wanted_status = status.as_deref().map(parse_job_status).transpose()?;
                let min_age_days = older_than.unwrap_or(0);
                let now = chrono::Utc::now();
                let mut reclaimed = Vec::new();
                for job in app.manager.list(&JobFilter::default()).await? {
                    if !job.state.is_terminal() {
                        continue;
                    }
                    if let Some(wanted) = wanted_status {
                        if std::mem::discriminant(&job.status()) != std::mem::discriminant(&wanted) {
                            continue;
                        }
                    }
                    if (now - job.updated_at()).num_days() < min_age_days {
                        continue;
                    }
                    app.manager.delete(&job.id).await?;
                    reclaimed.push(job.id);
                }
                reclaimed
            };
            println!("reclaimed {} job(s)", reclaimed.len());
            Ok(())
        }
        JobsCommand::Delete { job_id } => app.manager.delete(&job_id).await,
        JobsCommand::Finalize { job_id } => {
            let (job, outcome) = app.manager.finalize(&job_id, cancel).await?;
            report_outcome(&job.id, outcome);
            Ok(())
        }
    }
}

async fn run_watcher(app: &AppContext, cancel: CancellationToken) -> Result<()> {
    use crate::watcher::{Watcher, WatcherConfig};

    let configuration = build_configuration(&app.config, &RunOverrides {
        stop_after: None,
        skip_transcript: false,
        compression_mode: None,
        model: None,
        shelve_mode: None,
    });
    let watcher_config = WatcherConfig {
        input_dir: app.config.input_dir.clone(),
        poll_interval: std::time::Duration::from_secs(2),
        default_configuration: configuration,
    };

    let store: Arc<dyn JobStore> = app.store.clone();
    let providers = Arc::new(ProviderRegistry::discover(&app.config.providers_root).await?);
    let templates = Arc::new(TemplateRegistry::discover(&app.config.templates_root)?);
    let plugins = Arc::new(PluginRegistry::with_reference_plugins());
    let media_tool = Arc::new(FfmpegMediaTool::default());
    let ctx = PipelineContext { store: store.clone(), providers, templates, plugins, media_tool, results_root: app.config.results_root.clone() };
    let driver = PipelineDriver::new(ctx);

    let watcher = Watcher::new(store, driver, watcher_config);
    info!(input_dir = %app.config.input_dir.display(), "watcher starting");
    watcher.run(cancel).await
}

async fn print_report(app: &AppContext, days: Option<i64>) -> Result<()> {
    let report = cost::build_report(app.store.as_ref(), days).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_job_status(s: &str) -> Result<JobStatus> {
    match s {
        "created" => Ok(JobStatus::Created),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(Error::validation(format!("'{other}' is not a valid job status"))),
    }
}

fn build_configuration(config: &ProcessConfig, overrides: &RunOverrides) -> Configuration {
    let mut transcription = config.default_transcription.clone();
    let mut refinement = config.default_refinement.clone();
    if let Some(model) = &overrides.model {
        transcription.model = model.clone();
        refinement.model = model.clone();
    }
    Configuration {
        transcription,
        refinement,
        compression_mode: overrides.compression_mode.unwrap_or(config.default_compression_mode),
        language_hint: LanguageHint::Auto,
        artifacts: vec![ArtifactSpec { plugin: "markdown".to_string(), template: "summary".to_string(), filename_override: None }],
        shelve_mode: overrides.shelve_mode.unwrap_or(config.default_shelve_mode),
        skip_transcript: overrides.skip_transcript,
        debug: false,
    }
}
