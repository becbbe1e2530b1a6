//! GENERATE: render each configured artifact via its plugin (§4.3).

use tracing::info;

use crate::domain::{EnrichedContext, Transcript};
use crate::pipeline::PipelineContext;
use crate::store::Job;
use crate::Result;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SkippedArtifact {
    pub plugin: String,
    pub template: String,
    pub reason: String,
}

pub async fn run(
    ctx: &PipelineContext,
    job: &mut Job,
    context: &EnrichedContext,
    transcript: Option<&Transcript>,
) -> Result<Vec<SkippedArtifact>> {
    let mut skipped = Vec::new();
    let artifacts = job.meta.configuration.artifacts.clone();
    for spec in &artifacts {
        let plugin = match ctx.plugins.get(&spec.plugin) {
            Ok(plugin) => plugin,
            Err(err) => {
                skipped.push(SkippedArtifact { plugin: spec.plugin.clone(), template: spec.template.clone(), reason: err.to_string() });
                continue;
            }
        };

        if plugin.needs_transcript(&spec.template) && transcript.is_none() {
            skipped.push(SkippedArtifact {
                plugin: spec.plugin.clone(),
                template: spec.template.clone(),
                reason: "NoTranscriptForSubtitles".to_string(),
            });
            continue;
        }

        let rendered = plugin.render(crate::plugins::RenderInput { template_name: &spec.template, context, raw_transcript: transcript })?;
        let filename = spec.filename_override.clone().unwrap_or(rendered.suggested_filename);
        let dest = job.paths.artifacts_dir().join(&filename);
        tokio::fs::write(&dest, &rendered.bytes).await.map_err(|e| crate::Error::io_path("writing artifact", &dest, e))?;
        info!(job_id = %job.id, filename, "wrote artifact");
    }
    Ok(skipped)
}
