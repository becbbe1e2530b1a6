//! Core data types shared across the pipeline, job store, and providers.

pub mod config;
pub mod context;
pub mod ids;
pub mod ingest;
pub mod meta;
pub mod stage;
pub mod transcript;
pub mod usage;

pub use config::{ArtifactSpec, CompressionMode, Configuration, LanguageHint, ProviderChoice, ShelveMode};
pub use context::EnrichedContext;
pub use ingest::IngestResult;
pub use meta::JobMeta;
pub use stage::{JobState, JobStatus, StageRecord, StageStatus};
pub use transcript::{Transcript, TranscriptSegment};
pub use usage::{ProcessingTotals, UsageRecord};
