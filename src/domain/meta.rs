//! The full contents of `meta.json`: configuration snapshot + processing totals.

use serde::{Deserialize, Serialize};

use super::config::Configuration;
use super::usage::ProcessingTotals;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMeta {
    pub job_id: String,
    pub source: String,
    pub configuration: Configuration,
    pub processing: ProcessingTotals,
}
