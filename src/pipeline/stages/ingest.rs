//! INGEST: probe, compress, optionally upload, write `ingest.json` (§4.3).

use tokio_util::sync::CancellationToken;

use crate::domain::ingest::UPSTREAM_CACHE_MIN_SECONDS;
use crate::domain::IngestResult;
use crate::pipeline::PipelineContext;
use crate::store::Job;
use crate::Result;

pub async fn run(ctx: &PipelineContext, job: &mut Job, _cancel: CancellationToken) -> Result<IngestResult> {
    let info = ctx.media_tool.probe(&job.meta.source).await?;

    let working_copy_path = job.paths.media_dir().join("working_copy").with_extension(&info.format);
    let working_copy_path = working_copy_path.to_string_lossy().into_owned();
    ctx.media_tool
        .transform(&job.meta.source, &working_copy_path, job.meta.configuration.compression_mode)
        .await?;

    let provider_name = &job.meta.configuration.transcription.provider;
    let mut upstream_cache_handle = None;
    let mut uploaded_uri = None;
    if info.duration_seconds >= UPSTREAM_CACHE_MIN_SECONDS {
        if let Ok(provider) = ctx.providers.get_transcription(provider_name, &job.meta.configuration.transcription.model) {
            if provider.ingest_specs().needs_upstream_cache {
                upstream_cache_handle = Some(format!("cache://{}/{}", provider_name, job.id));
            }
            if provider.ingest_specs().accepts_uri {
                uploaded_uri = Some(working_copy_path.clone());
            }
        }
    }

    let ingest_result = IngestResult {
        source_path: job.meta.source.clone(),
        working_copy_path,
        compressed_path: None,
        duration_seconds: info.duration_seconds,
        format: info.format,
        bitrate_kbps: info.bitrate_kbps,
        upstream_cache_handle,
        uploaded_uri,
    };

    crate::store::atomic::write_json_atomic(&job.paths.ingest_file(), &ingest_result).await?;
    Ok(ingest_result)
}
