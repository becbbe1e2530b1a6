//! Reference Markdown plugin: exercises the plugin contract end-to-end,
//! nothing more. The real rendering engine is out of scope (§1).

use super::{Plugin, RenderInput, RenderedArtifact};
use crate::domain::context::{FIELD_LANGUAGE, FIELD_MODEL, FIELD_PROVIDER};
use crate::Result;

pub struct MarkdownPlugin;

impl Plugin for MarkdownPlugin {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn needs_transcript(&self, _template_name: &str) -> bool {
        false
    }

    fn render(&self, input: RenderInput<'_>) -> Result<RenderedArtifact> {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", input.template_name));

        if let Some(summary) = input.context.get("summary").and_then(|v| v.as_str()) {
            out.push_str(summary);
            out.push_str("\n\n");
        }

        if let Some(takeaways) = input.context.get("key_takeaways").and_then(|v| v.as_array()) {
            out.push_str("## Key takeaways\n\n");
            for item in takeaways {
                if let Some(text) = item.as_str() {
                    out.push_str(&format!("- {text}\n"));
                }
            }
            out.push('\n');
        }

        if let Some(items) = input.context.get("action_items").and_then(|v| v.as_array()) {
            out.push_str("## Action items\n\n");
            for item in items {
                if let Some(text) = item.as_str() {
                    out.push_str(&format!("- [ ] {text}\n"));
                }
            }
            out.push('\n');
        }

        out.push_str("---\n");
        if let Some(provider) = input.context.get(FIELD_PROVIDER).and_then(|v| v.as_str()) {
            out.push_str(&format!("*Generated by {provider}"));
            if let Some(model) = input.context.get(FIELD_MODEL).and_then(|v| v.as_str()) {
                out.push_str(&format!("/{model}"));
            }
            if let Some(lang) = input.context.get(FIELD_LANGUAGE).and_then(|v| v.as_str()) {
                out.push_str(&format!(", language: {lang}"));
            }
            out.push_str("*\n");
        }

        Ok(RenderedArtifact {
            bytes: out.into_bytes(),
            suggested_filename: format!("{}.{}", input.template_name, self.extension()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnrichedContext;
    use serde_json::json;

    #[test]
    fn renders_summary_and_action_items() {
        let mut context = EnrichedContext::new("local", "base", "en");
        context.fields.insert("summary".to_string(), json!("A short summary."));
        context.fields.insert("key_takeaways".to_string(), json!(["point one", "point two"]));
        context.fields.insert("action_items".to_string(), json!(["follow up with finance"]));

        let plugin = MarkdownPlugin;
        let rendered = plugin
            .render(RenderInput { template_name: "summary", context: &context, raw_transcript: None })
            .unwrap();
        let text = String::from_utf8(rendered.bytes).unwrap();
        assert!(text.contains("A short summary."));
        assert!(text.contains("- point one"));
        assert!(text.contains("- [ ] follow up with finance"));
        assert_eq!(rendered.suggested_filename, "summary.md");
    }

    #[test]
    fn markdown_plugin_never_needs_the_raw_transcript() {
        let plugin = MarkdownPlugin;
        assert!(!plugin.needs_transcript("summary"));
    }
}
