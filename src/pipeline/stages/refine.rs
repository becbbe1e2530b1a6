//! REFINE: assemble the schema, call the refinement provider in standard or
//! direct mode, write `enriched_context.json` (§4.3).

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::{EnrichedContext, IngestResult, Transcript, UsageRecord};
use crate::pipeline::PipelineContext;
use crate::providers::RefinementInput;
use crate::store::Job;
use crate::templates::assemble_schema;
use crate::Result;

pub async fn run(
    ctx: &PipelineContext,
    job: &mut Job,
    ingest: &IngestResult,
    transcript: Option<&Transcript>,
    cancel: CancellationToken,
) -> Result<(EnrichedContext, UsageRecord)> {
    let schemas: Vec<_> = job
        .meta
        .configuration
        .artifacts
        .iter()
        .filter_map(|spec| ctx.templates.get(&spec.plugin, &spec.template).ok())
        .map(|def| &def.schema)
        .collect();
    let schema = assemble_schema(schemas)?;

    let choice = &job.meta.configuration.refinement;
    let provider = ctx.providers.get_refinement(&choice.provider, &choice.model)?;
    let language_hint = &job.meta.configuration.language_hint;

    let compact_text;
    let input = match transcript {
        Some(transcript) => {
            compact_text = transcript.to_compact_text();
            RefinementInput::TextTranscript(&compact_text)
        }
        None => {
            if !language_hint.is_explicit() {
                warn!(job_id = %job.id, "direct-mode refinement without an explicit language hint");
            }
            RefinementInput::AudioHandle {
                upstream_cache_handle: ingest.upstream_cache_handle.as_deref(),
                uploaded_uri: ingest.uploaded_uri.as_deref(),
            }
        }
    };

    let (fields, usage) = provider.refine(input, &schema, language_hint, cancel).await?;

    let detected_language = fields
        .get("detected_language")
        .and_then(|v| v.as_str())
        .unwrap_or("auto")
        .to_string();
    let mut context = EnrichedContext::new(&choice.provider, &choice.model, &detected_language);
    for (key, value) in fields {
        context.fields.insert(key, value);
    }

    crate::store::atomic::write_json_atomic(&job.paths.enriched_context_file(), &context).await?;
    Ok((context, usage))
}
