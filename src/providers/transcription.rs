//! The transcription provider contract (§4.5).

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::domain::{IngestResult, LanguageHint, TranscriptSegment, UsageRecord};
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSpecs {
    pub needs_upstream_cache: bool,
    pub accepts_uri: bool,
}

/// One item of the provider's segment stream. The stream may end either by
/// an explicit `End` marker or by closing outright; the executor must handle
/// both and must never loop on repeated `End` markers (§9).
#[derive(Debug, Clone)]
pub enum SegmentEvent {
    Segment(TranscriptSegment),
    End,
}

/// A transcription call in progress: the segment stream plus a usage record
/// that resolves once the backend has finished (and, for backends exposing a
/// post-hoc cost endpoint, once that endpoint has been queried).
pub struct TranscribeCall {
    pub segments: BoxStream<'static, Result<SegmentEvent>>,
    pub usage: oneshot::Receiver<UsageRecord>,
}

#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn ingest_specs(&self) -> IngestSpecs;

    async fn transcribe(
        &self,
        ingest: &IngestResult,
        language_hint: &LanguageHint,
        cancel: CancellationToken,
    ) -> Result<TranscribeCall>;

    /// Best-effort release of an upstream cache handle obtained through this
    /// provider (§5 "Shared resources"). Providers whose `ingest_specs()`
    /// never reports `needs_upstream_cache` can rely on the no-op default.
    async fn release_upstream_cache(&self, _handle: &str) -> Result<()> {
        Ok(())
    }
}

/// Consume a segment stream into a validated, ordered list, stopping at the
/// first `End` marker or stream close — whichever comes first — and never
/// looping if the provider sends more than one `End` marker (a real bug fixed
/// upstream in the reference implementation).
pub async fn drain_segments(
    mut stream: BoxStream<'static, Result<SegmentEvent>>,
) -> Result<Vec<TranscriptSegment>> {
    use futures::StreamExt;

    let mut segments = Vec::new();
    while let Some(event) = stream.next().await {
        match event? {
            SegmentEvent::Segment(segment) => {
                segment.validate_ordering()?;
                segments.push(segment);
            }
            SegmentEvent::End => break,
        }
    }
    Ok(segments)
}
