//! SCRIBE: transcribe via the configured provider, writing segments
//! incrementally and atomically (§4.3).

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::domain::{IngestResult, Transcript, UsageRecord};
use crate::pipeline::PipelineContext;
use crate::providers::SegmentEvent;
use crate::store::Job;
use crate::Result;

pub async fn run(
    ctx: &PipelineContext,
    job: &mut Job,
    ingest: &IngestResult,
    cancel: CancellationToken,
) -> Result<(Transcript, UsageRecord)> {
    let choice = &job.meta.configuration.transcription;
    let provider = ctx.providers.get_transcription(&choice.provider, &choice.model)?;

    let call = provider.transcribe(ingest, &job.meta.configuration.language_hint, cancel).await?;

    let final_path = job.paths.raw_transcript_file();
    let tmp_path = final_path.with_extension("json.tmp");
    let mut tmp_file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| crate::Error::io_path("creating transcript scratch file", &tmp_path, e))?;

    // Each segment is appended to `tmp_path` as newline-delimited JSON and
    // flushed before the next one is requested, so a crash or cancel mid-stream
    // leaves everything transcribed so far durable on disk rather than losing
    // the whole call. The scratch file is only overwritten with the final
    // pretty-printed `Transcript` object once the stream has fully drained.
    let mut transcript = Transcript::default();
    let mut segments = call.segments;
    while let Some(event) = segments.next().await {
        match event? {
            SegmentEvent::Segment(segment) => {
                let mut line = serde_json::to_vec(&segment)?;
                line.push(b'\n');
                tmp_file.write_all(&line).await.map_err(|e| crate::Error::io_path("appending transcript segment", &tmp_path, e))?;
                tmp_file.flush().await.map_err(|e| crate::Error::io_path("flushing transcript segment", &tmp_path, e))?;
                transcript.push_validated(segment)?;
            }
            SegmentEvent::End => break,
        }
    }
    drop(tmp_file);

    let bytes = serde_json::to_vec_pretty(&transcript)?;
    tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| crate::Error::io_path("writing transcript", &tmp_path, e))?;
    tokio::fs::rename(&tmp_path, &final_path).await.map_err(|e| crate::Error::io_path("renaming transcript into place", &final_path, e))?;

    let usage = call.usage.await.map_err(|_| {
        crate::Error::Provider {
            stage: crate::error::StageName::Scribe,
            provider: choice.provider.clone(),
            model: choice.model.clone(),
            cause: "provider dropped its usage channel before reporting cost".to_string(),
            source: None,
        }
    })?;

    Ok((transcript, usage))
}
