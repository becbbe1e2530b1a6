//! The per-job `Configuration` snapshot, frozen at job creation.
//!
//! Subsequent edits to the process-level config (`crate::config`) never affect
//! a job that has already started; this struct is what gets embedded verbatim
//! into `meta.json`.

use serde::{Deserialize, Serialize};

/// How INGEST transforms the source media before registering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    /// Copy the source verbatim.
    Original,
    /// Re-encode to 24 kbps Opus in an Ogg container.
    Compressed,
    /// Compressed, plus silence-trimming.
    Optimized,
}

impl Default for CompressionMode {
    fn default() -> Self {
        CompressionMode::Compressed
    }
}

impl std::str::FromStr for CompressionMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(CompressionMode::Original),
            "compressed" => Ok(CompressionMode::Compressed),
            "optimized" => Ok(CompressionMode::Optimized),
            other => Err(crate::Error::validation(format!(
                "'{other}' is not a valid compression mode (expected original|compressed|optimized)"
            ))),
        }
    }
}

/// How SHELVE places finalized artifacts into the results library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShelveMode {
    /// `<results>/<YYYY>/<MM>/<DD>/<job_id>/`.
    Timeline,
    /// `<results>/` with pattern-based renaming and tag routing.
    Flat,
    /// Alias of `Flat` kept for readability at call sites; same routing rules.
    Zettelkasten,
}

impl Default for ShelveMode {
    fn default() -> Self {
        ShelveMode::Timeline
    }
}

impl std::str::FromStr for ShelveMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeline" => Ok(ShelveMode::Timeline),
            "flat" => Ok(ShelveMode::Flat),
            "zettelkasten" => Ok(ShelveMode::Zettelkasten),
            other => Err(crate::Error::validation(format!(
                "'{other}' is not a valid shelve mode (expected timeline|flat|zettelkasten)"
            ))),
        }
    }
}

/// The language hint passed to providers; `Auto` lets the provider detect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageHint {
    Auto,
    Explicit(String),
}

impl LanguageHint {
    pub fn is_explicit(&self) -> bool {
        matches!(self, LanguageHint::Explicit(_))
    }
}

impl Default for LanguageHint {
    fn default() -> Self {
        LanguageHint::Auto
    }
}

/// One entry in the job's configured artifact list: a (plugin, template) pair
/// plus an optional filename override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub plugin: String,
    pub template: String,
    pub filename_override: Option<String>,
}

/// The chosen provider+model for one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderChoice {
    pub provider: String,
    pub model: String,
}

/// The configuration snapshot captured at job creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub transcription: ProviderChoice,
    pub refinement: ProviderChoice,
    pub compression_mode: CompressionMode,
    pub language_hint: LanguageHint,
    pub artifacts: Vec<ArtifactSpec>,
    pub shelve_mode: ShelveMode,
    /// Direct mode: REFINE runs against the ingest handle, bypassing SCRIBE.
    pub skip_transcript: bool,
    pub debug: bool,
}
