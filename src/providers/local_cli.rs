//! The `local` reference provider: an external CLI tool invoked as a child
//! process, with no API key and no upstream cache (§4.5 expansion).
//!
//! Grounded in the workspace's small `process-utils`-style helpers for
//! spawning children without a console window on Windows; everything else
//! (argument shape, stdout framing) is specific to this provider's contract
//! and has no equivalent upstream.

use std::process::Stdio;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::process_util::tokio_command;
use super::refinement::{RefinementInput, RefinementProvider};
use super::transcription::{IngestSpecs, SegmentEvent, TranscribeCall, TranscriptionProvider};
use crate::domain::{IngestResult, LanguageHint, TranscriptSegment, UsageRecord};
use crate::error::StageName;
use crate::templates::FieldSpec;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Invokes a single external binary for both transcription and refinement,
/// selected by subcommand (`transcribe` / `refine`). The binary is expected
/// to write one JSON object per line to stdout and exit zero on success.
pub struct LocalCliProvider {
    pub binary: String,
}

impl LocalCliProvider {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn spawn_failure(&self, cause: impl std::fmt::Display, stage: StageName, source: Option<std::io::Error>) -> Error {
        Error::Provider {
            stage,
            provider: "local".to_string(),
            model: "base".to_string(),
            cause: cause.to_string(),
            source: source.map(|e| Box::new(Error::io_path("local CLI tool", self.binary.as_str(), e))),
        }
    }
}

#[async_trait]
impl TranscriptionProvider for LocalCliProvider {
    fn ingest_specs(&self) -> IngestSpecs {
        IngestSpecs { needs_upstream_cache: false, accepts_uri: false }
    }

    async fn transcribe(
        &self,
        ingest: &IngestResult,
        language_hint: &LanguageHint,
        cancel: CancellationToken,
    ) -> Result<TranscribeCall> {
        let mut cmd = tokio_command(&self.binary);
        cmd.arg("transcribe").arg(&ingest.working_copy_path).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let LanguageHint::Explicit(code) = language_hint {
            cmd.arg("--language").arg(code);
        }

        let mut child = cmd.spawn().map_err(|e| self.spawn_failure("failed to spawn local CLI tool", StageName::Scribe, Some(e)))?;
        let stdout = child.stdout.take().expect("stdout was piped");
        let mut lines = BufReader::new(stdout).lines();

        let started = std::time::Instant::now();
        let mut segments = Vec::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    return Err(Error::Cancelled(StageName::Scribe));
                }
                line = lines.next_line() => {
                    match line.map_err(|e| self.spawn_failure("failed reading local CLI stdout", StageName::Scribe, Some(e)))? {
                        None => break,
                        Some(line) if line.trim().is_empty() => continue,
                        Some(line) => {
                            let parsed: LocalTranscriptLine = serde_json::from_str(&line)
                                .map_err(|e| self.spawn_failure(format!("malformed stdout line: {e}"), StageName::Scribe, None))?;
                            segments.push(Ok(SegmentEvent::Segment(TranscriptSegment {
                                speaker_id: parsed.speaker_id,
                                start_time: parsed.start,
                                end_time: parsed.end,
                                text: parsed.text,
                                confidence: parsed.confidence,
                            })));
                        }
                    }
                }
            }
        }
        segments.push(Ok(SegmentEvent::End));

        let status = child.wait().await.map_err(|e| self.spawn_failure("local CLI tool did not exit cleanly", StageName::Scribe, Some(e)))?;
        if !status.success() {
            return Err(self.spawn_failure(format!("local CLI tool exited with {status}"), StageName::Scribe, None));
        }

        let duration = started.elapsed().as_secs_f64();
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(UsageRecord {
            stage: StageName::Scribe,
            provider: "local".to_string(),
            model: "base".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            duration_seconds: duration,
            request_count: 1,
        });

        let boxed: BoxStream<'static, Result<SegmentEvent>> = stream::iter(segments).boxed();
        Ok(TranscribeCall { segments: boxed, usage: rx })
    }
}

#[async_trait]
impl RefinementProvider for LocalCliProvider {
    async fn refine(
        &self,
        input: RefinementInput<'_>,
        schema: &BTreeMap<String, FieldSpec>,
        language_hint: &LanguageHint,
        cancel: CancellationToken,
    ) -> Result<(serde_json::Map<String, serde_json::Value>, UsageRecord)> {
        let transcript_text = match input {
            RefinementInput::TextTranscript(text) => text.to_string(),
            RefinementInput::AudioHandle { .. } => {
                return Err(self.spawn_failure(
                    "the local CLI provider has no upstream cache and cannot run direct-mode refinement",
                    StageName::Refine,
                    None,
                ));
            }
        };

        let schema_json = serde_json::to_string(schema)
            .map_err(|e| self.spawn_failure(format!("failed to encode schema for local CLI tool: {e}"), StageName::Refine, None))?;

        let mut cmd = tokio_command(&self.binary);
        cmd.arg("refine")
            .arg("--schema")
            .arg(&schema_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let LanguageHint::Explicit(code) = language_hint {
            cmd.arg("--language").arg(code);
        }

        let mut child = cmd.spawn().map_err(|e| self.spawn_failure("failed to spawn local CLI tool", StageName::Refine, Some(e)))?;
        {
            use tokio::io::AsyncWriteExt;
            let mut stdin = child.stdin.take().expect("stdin was piped");
            stdin
                .write_all(transcript_text.as_bytes())
                .await
                .map_err(|e| self.spawn_failure("failed writing transcript to local CLI tool", StageName::Refine, Some(e)))?;
        }

        let started = std::time::Instant::now();
        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                return Err(Error::Cancelled(StageName::Refine));
            }
            status = child.wait() => {
                status.map_err(|e| self.spawn_failure("local CLI tool did not exit cleanly", StageName::Refine, Some(e)))?
            }
        };
        let output = {
            use tokio::io::AsyncReadExt;
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            if let Some(mut stdout) = child.stdout.take() {
                let _ = stdout.read_to_end(&mut stdout_buf).await;
            }
            if let Some(mut stderr) = child.stderr.take() {
                let _ = stderr.read_to_end(&mut stderr_buf).await;
            }
            std::process::Output { status, stdout: stdout_buf, stderr: stderr_buf }
        };
        if !output.status.success() {
            return Err(self.spawn_failure(format!("local CLI tool exited with {}", output.status), StageName::Refine, None));
        }

        let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&output.stdout)
            .map_err(|e| self.spawn_failure(format!("malformed refinement output: {e}"), StageName::Refine, None))?;

        let usage = UsageRecord {
            stage: StageName::Refine,
            provider: "local".to_string(),
            model: "base".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            duration_seconds: started.elapsed().as_secs_f64(),
            request_count: 1,
        };
        Ok((fields, usage))
    }
}

#[derive(Debug, serde::Deserialize)]
struct LocalTranscriptLine {
    speaker_id: String,
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}
