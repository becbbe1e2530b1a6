//! The `ingest.json` artifact produced by INGEST.

use serde::{Deserialize, Serialize};

/// The media duration threshold, in seconds, above which providers exposing
/// an upstream cache are asked to upload once and keep a handle.
pub const UPSTREAM_CACHE_MIN_SECONDS: f64 = 300.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub source_path: String,
    pub working_copy_path: String,
    pub compressed_path: Option<String>,
    pub duration_seconds: f64,
    pub format: String,
    pub bitrate_kbps: u32,
    /// Opaque, provider-scoped identifier for previously-uploaded media.
    pub upstream_cache_handle: Option<String>,
    pub uploaded_uri: Option<String>,
}

impl IngestResult {
    pub fn eligible_for_upstream_cache(&self) -> bool {
        self.duration_seconds >= UPSTREAM_CACHE_MIN_SECONDS
    }
}
