//! Provider abstraction: metadata-driven discovery over two capabilities,
//! transcription and refinement (§4.5).

mod cloud_http;
mod descriptor;
mod local_cli;
pub(crate) mod process_util;
mod refinement;
mod registry;
mod retry;
mod transcription;

pub use cloud_http::CloudHttpProvider;
pub use descriptor::{Capability, ModelCost, ProviderDescriptor, ProviderType};
pub use local_cli::LocalCliProvider;
pub use refinement::{RefinementInput, RefinementProvider};
pub use registry::ProviderRegistry;
pub use retry::{retry_transient, RetryPolicy};
pub use transcription::{drain_segments, IngestSpecs, SegmentEvent, TranscribeCall, TranscriptionProvider};
