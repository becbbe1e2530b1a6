//! `clap` derive definitions for the full CLI surface (§6).

use clap::{Parser, Subcommand};

use crate::error::StageName;

#[derive(Debug, Parser)]
#[command(name = "scribeforge", about = "Resumable, staged audio-to-document processing", version)]
pub struct Cli {
    /// Path to `config.toml`; defaults to `./config.toml` if present.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunOverrides {
    #[arg(long, value_name = "STAGE")]
    pub stop_after: Option<StageName>,
    #[arg(long)]
    pub skip_transcript: bool,
    #[arg(long, value_name = "MODE")]
    pub compression_mode: Option<crate::domain::CompressionMode>,
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,
    #[arg(long, value_name = "MODE")]
    pub shelve_mode: Option<crate::domain::ShelveMode>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ContinueArgs {
    /// Job id; defaults to the most recently updated job.
    pub job_id: Option<String>,
    #[arg(long, value_name = "STAGE")]
    pub stop_after: Option<StageName>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new job from `source` and run it through `--stop-after` (default: shelve).
    Run {
        source: String,
        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Continue an existing (or latest) job from INGEST.
    Ingest(ContinueArgs),
    /// Continue an existing (or latest) job from SCRIBE.
    Scribe(ContinueArgs),
    /// Continue an existing (or latest) job from REFINE.
    Refine(ContinueArgs),
    /// Continue an existing (or latest) job from GENERATE.
    Generate(ContinueArgs),
    /// Continue an existing (or latest) job from SHELVE.
    Shelve(ContinueArgs),
    /// Job bookkeeping subcommands.
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Run the input-directory watcher loop until interrupted.
    Watch,
    /// Aggregate usage/cost across jobs in the working root.
    Report {
        #[arg(long)]
        days: Option<i64>,
    },
    /// Out of scope: interactive first-run configuration wizard.
    Setup,
}

#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        since: Option<chrono::DateTime<chrono::Utc>>,
    },
    Show {
        job_id: String,
    },
    Retry {
        job_id: String,
        #[arg(long, value_name = "STAGE")]
        from_stage: Option<StageName>,
    },
    Cleanup {
        #[arg(long)]
        older_than: Option<i64>,
        #[arg(long)]
        status: Option<String>,
    },
    Delete {
        job_id: String,
    },
    Finalize {
        job_id: String,
    },
}
