//! The refinement provider contract (§4.5).

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{LanguageHint, UsageRecord};
use crate::templates::FieldSpec;
use crate::Result;

/// What REFINE passes to the provider: a compact transcript (standard mode)
/// or the ingest handle/URI (direct mode).
pub enum RefinementInput<'a> {
    TextTranscript(&'a str),
    AudioHandle { upstream_cache_handle: Option<&'a str>, uploaded_uri: Option<&'a str> },
}

#[async_trait]
pub trait RefinementProvider: Send + Sync {
    async fn refine(
        &self,
        input: RefinementInput<'_>,
        schema: &BTreeMap<String, FieldSpec>,
        language_hint: &LanguageHint,
        cancel: CancellationToken,
    ) -> Result<(serde_json::Map<String, serde_json::Value>, UsageRecord)>;
}
