//! The pipeline engine: five ordered stages over a per-job working
//! directory, driven by [`driver::PipelineDriver`] (§2, §4.2).

pub mod driver;
pub mod media;
pub mod prerequisites;
pub mod stages;

use std::path::PathBuf;
use std::sync::Arc;

use crate::plugins::PluginRegistry;
use crate::providers::ProviderRegistry;
use crate::store::JobStore;
use crate::templates::TemplateRegistry;
use media::MediaTool;

pub use driver::{PipelineDriver, RunOutcome};

/// Shared, read-mostly services every stage needs. Cheap to clone (all `Arc`).
pub struct PipelineContext {
    pub store: Arc<dyn JobStore>,
    pub providers: Arc<ProviderRegistry>,
    pub templates: Arc<TemplateRegistry>,
    pub plugins: Arc<PluginRegistry>,
    pub media_tool: Arc<dyn MediaTool>,
    pub results_root: PathBuf,
}
