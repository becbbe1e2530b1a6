//! Application-wide error types.

use std::path::PathBuf;

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The stage a pipeline-layer error occurred in, carried alongside the cause
/// so the driver can write it into `state.json` without re-deriving context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Ingest,
    Scribe,
    Refine,
    Generate,
    Shelve,
}

impl StageName {
    pub const ORDER: [StageName; 5] = [
        StageName::Ingest,
        StageName::Scribe,
        StageName::Refine,
        StageName::Generate,
        StageName::Shelve,
    ];

    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|s| *s == self).expect("exhaustive")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Ingest => "ingest",
            StageName::Scribe => "scribe",
            StageName::Refine => "refine",
            StageName::Generate => "generate",
            StageName::Shelve => "shelve",
        }
    }
}

impl std::str::FromStr for StageName {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ingest" => Ok(StageName::Ingest),
            "scribe" => Ok(StageName::Scribe),
            "refine" => Ok(StageName::Refine),
            "generate" => Ok(StageName::Generate),
            "shelve" => Ok(StageName::Shelve),
            other => Err(Error::validation(format!("'{other}' is not a valid stage name"))),
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a stage cannot proceed; attached to `Error::Prerequisite` so the driver
/// can print an actionable hint naming the command that would resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrerequisiteCause {
    FileMissing,
    FileEmpty,
    MissingIngest,
    MissingRefineInput,
    MissingContext,
    NoArtifacts,
}

impl PrerequisiteCause {
    /// The command that would produce the missing artifact, surfaced to the user.
    pub fn hint(self, stage: StageName) -> String {
        match self {
            PrerequisiteCause::FileMissing | PrerequisiteCause::FileEmpty => {
                "check the source path passed to `run`".to_string()
            }
            PrerequisiteCause::MissingIngest => "run `ingest <source>` first".to_string(),
            PrerequisiteCause::MissingRefineInput => {
                "run `scribe` first, or pass --skip-transcript for direct mode".to_string()
            }
            PrerequisiteCause::MissingContext => "run `refine` first".to_string(),
            PrerequisiteCause::NoArtifacts => format!(
                "run `generate` first (stage {stage} found no files under artifacts/)"
            ),
        }
    }
}

impl std::fmt::Display for PrerequisiteCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PrerequisiteCause::FileMissing => "FileMissing",
            PrerequisiteCause::FileEmpty => "FileEmpty",
            PrerequisiteCause::MissingIngest => "MissingIngest",
            PrerequisiteCause::MissingRefineInput => "MissingRefineInput",
            PrerequisiteCause::MissingContext => "MissingContext",
            PrerequisiteCause::NoArtifacts => "NoArtifacts",
        };
        write!(f, "{s}")
    }
}

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error during {op} on {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state transition: cannot transition stage {stage} from {from} to {to}")]
    InvalidStateTransition {
        stage: StageName,
        from: String,
        to: String,
    },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("template schema conflict on field '{field}': {a} vs {b}")]
    TemplateSchemaConflict { field: String, a: String, b: String },

    #[error("prerequisite not satisfied for stage {stage}: {cause} ({hint})")]
    Prerequisite {
        stage: StageName,
        cause: PrerequisiteCause,
        hint: String,
    },

    #[error("segment ordering violation: segment starting at {start} ends at {end}")]
    SegmentOrderingViolation { start: f64, end: f64 },

    #[error("provider error in stage {stage} ({provider}/{model}): {cause}")]
    Provider {
        stage: StageName,
        provider: String,
        model: String,
        cause: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("cancelled during stage {0}")]
    Cancelled(StageName),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("missing API key for provider '{provider}': expected env var {env_var}")]
    MissingApiKey { provider: String, env_var: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn io_path(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { op, path: path.into(), source }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound(id.into())
    }

    pub fn prerequisite(stage: StageName, cause: PrerequisiteCause) -> Self {
        let hint = cause.hint(stage);
        Self::Prerequisite { stage, cause, hint }
    }

    /// Whether this error class should be retried in-stage (rate limiting,
    /// timeouts, transient network/5xx) rather than failing the stage outright.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Provider { cause, .. } if is_transient_cause(cause))
    }

    /// Exit code per the CLI contract: 1 for user errors, 2 for internal failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_)
            | Error::Configuration(_)
            | Error::JobNotFound(_)
            | Error::UnknownProvider(_)
            | Error::MissingApiKey { .. }
            | Error::TemplateSchemaConflict { .. }
            | Error::Prerequisite { .. } => 1,
            _ => 2,
        }
    }
}

fn is_transient_cause(cause: &str) -> bool {
    let lower = cause.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("timeout") || lower.contains("timed out")
        || lower.contains("connection") || lower.contains("50") // crude 5xx sniff, e.g. "502", "503"
}
