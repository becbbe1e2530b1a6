//! `ProviderDescriptor`: the metadata shape discovered from
//! `<providers_root>/<name>/defaults.yaml`. Never hard-coded (§4.5).

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Cloud,
    Local,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Transcription,
    Refinement,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Transcription => write!(f, "transcription"),
            Capability::Refinement => write!(f, "refinement"),
        }
    }
}

/// Per-model cost, in USD per 1,000 tokens; used only as a fallback estimate
/// when a backend has no post-hoc cost endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelCost {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub capabilities: Vec<Capability>,
    /// Environment variable name holding the API key, if any is required.
    pub api_key_requirement: Option<String>,
    pub models: Vec<String>,
    #[serde(default)]
    pub cost_table: BTreeMap<String, ModelCost>,
    /// Whether this provider exposes an upstream media cache (§4.3 INGEST).
    #[serde(default)]
    pub needs_upstream_cache: bool,
}

impl ProviderDescriptor {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_requirement.is_some()
    }
}
