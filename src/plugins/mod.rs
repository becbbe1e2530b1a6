//! Rendering plugin contract (§6). The core depends on no specific renderer;
//! GenerateStage resolves plugins by name and treats their output as opaque bytes.

pub mod markdown;
pub mod subtitles;

use std::collections::BTreeMap;

use crate::domain::{EnrichedContext, Transcript};
use crate::Result;

/// What a plugin needs to render one template: the enriched context, plus the
/// raw transcript when the template declares it needs one (e.g. subtitles).
pub struct RenderInput<'a> {
    pub template_name: &'a str,
    pub context: &'a EnrichedContext,
    pub raw_transcript: Option<&'a Transcript>,
}

#[derive(Debug)]
pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub suggested_filename: String,
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn extension(&self) -> &'static str;
    /// Whether this template, for this plugin, needs the raw transcript to render.
    fn needs_transcript(&self, template_name: &str) -> bool;
    fn render(&self, input: RenderInput<'_>) -> Result<RenderedArtifact>;
}

pub struct PluginRegistry {
    plugins: BTreeMap<String, Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn with_reference_plugins() -> Self {
        let mut plugins: BTreeMap<String, Box<dyn Plugin>> = BTreeMap::new();
        let markdown = markdown::MarkdownPlugin;
        plugins.insert(markdown.name().to_string(), Box::new(markdown));
        let subtitles = subtitles::SubtitlesPlugin;
        plugins.insert(subtitles.name().to_string(), Box::new(subtitles));
        Self { plugins }
    }

    pub fn get(&self, name: &str) -> Result<&dyn Plugin> {
        self.plugins
            .get(name)
            .map(|boxed| boxed.as_ref())
            .ok_or_else(|| crate::Error::validation(format!("unknown plugin '{name}'")))
    }
}
