//! The `cloud` reference provider: a generic JSON-over-HTTP backend with an
//! API key, an upstream media cache, and a post-hoc cost-query endpoint
//! (§4.5 expansion).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::refinement::{RefinementInput, RefinementProvider};
use super::retry::{retry_transient, RetryPolicy};
use super::transcription::{IngestSpecs, SegmentEvent, TranscribeCall, TranscriptionProvider};
use crate::domain::{IngestResult, LanguageHint, TranscriptSegment, UsageRecord};
use crate::error::StageName;
use crate::templates::FieldSpec;
use crate::{Error, Result};

pub struct CloudHttpProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry_policy: RetryPolicy,
}

impl CloudHttpProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry_policy: RetryPolicy::default(),
        })
    }

    fn provider_error(&self, stage: StageName, cause: impl std::fmt::Display) -> Error {
        Error::Provider {
            stage,
            provider: "cloud".to_string(),
            model: self.model.clone(),
            cause: cause.to_string(),
            source: None,
        }
    }

    async fn query_cost(&self, stage: StageName, job_ref: &str) -> Result<f64> {
        let url = format!("{}/v1/usage/{}", self.base_url, job_ref);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| map_transport_error(self, stage, e))?;
        if !response.status().is_success() {
            return Err(self.provider_error(stage, format!("cost query returned {}", response.status())));
        }
        let body: CostResponse =
            response.json().await.map_err(|e| self.provider_error(stage, format!("malformed cost response: {e}")))?;
        Ok(body.cost_usd)
    }
}

#[derive(Debug, Deserialize)]
struct CostResponse {
    cost_usd: f64,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    job_ref: String,
    detected_language: String,
    segments: Vec<CloudSegment>,
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct CloudSegment {
    speaker_id: String,
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RefineResponse {
    job_ref: String,
    fields: serde_json::Map<String, serde_json::Value>,
    input_tokens: u64,
    output_tokens: u64,
}

/// `is_transient_cause` (`crate::error`) pattern-matches the rendered cause
/// string; a plain `"backend returned 429 Too Many Requests"` doesn't hit any
/// of its substrings, so the rate-limit case gets its own wording here.
fn status_cause(status: reqwest::StatusCode) -> String {
    if status.as_u16() == 429 {
        "rate limit exceeded".to_string()
    } else {
        format!("backend returned {status}")
    }
}

fn map_transport_error(provider: &CloudHttpProvider, stage: StageName, source: reqwest::Error) -> Error {
    let cause = if source.is_timeout() {
        "request timed out".to_string()
    } else if source.is_connect() {
        "connection failed".to_string()
    } else if let Some(status) = source.status() {
        status_cause(status)
    } else {
        source.to_string()
    };
    provider.provider_error(stage, cause)
}

#[async_trait]
impl TranscriptionProvider for CloudHttpProvider {
    fn ingest_specs(&self) -> IngestSpecs {
        IngestSpecs { needs_upstream_cache: true, accepts_uri: true }
    }

    async fn transcribe(
        &self,
        ingest: &IngestResult,
        language_hint: &LanguageHint,
        cancel: CancellationToken,
    ) -> Result<TranscribeCall> {
        let url = format!("{}/v1/transcribe", self.base_url);
        let language = match language_hint {
            LanguageHint::Auto => None,
            LanguageHint::Explicit(code) => Some(code.clone()),
        };
        let media_ref = ingest.upstream_cache_handle.clone().or_else(|| ingest.uploaded_uri.clone());

        let policy = self.retry_policy;
        let started = std::time::Instant::now();
        let (result, attempts) = retry_transient("cloud.transcribe", policy, || {
            let url = url.clone();
            let language = language.clone();
            let media_ref = media_ref.clone();
            let cancel = cancel.clone();
            async move {
                let response = tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled(StageName::Scribe)),
                    result = self
                        .client
                        .post(&url)
                        .bearer_auth(&self.api_key)
                        .json(&serde_json::json!({
                            "model": self.model,
                            "language": language,
                            "media_ref": media_ref,
                        }))
                        .send() => result.map_err(|e| map_transport_error(self, StageName::Scribe, e))?,
                };
                if !response.status().is_success() {
                    return Err(self.provider_error(StageName::Scribe, status_cause(response.status())));
                }
                response
                    .json::<TranscribeResponse>()
                    .await
                    .map_err(|e| self.provider_error(StageName::Scribe, format!("malformed transcribe response: {e}")))
            }
        })
        .await;
        let body = result?;

        let segments: Vec<Result<SegmentEvent>> = body
            .segments
            .into_iter()
            .map(|s| {
                Ok(SegmentEvent::Segment(TranscriptSegment {
                    speaker_id: s.speaker_id,
                    start_time: s.start,
                    end_time: s.end,
                    text: s.text,
                    confidence: s.confidence,
                }))
            })
            .chain(std::iter::once(Ok(SegmentEvent::End)))
            .collect();

        let (tx, rx) = oneshot::channel();
        let provider_model = self.model.clone();
        let job_ref = body.job_ref;
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();
        let client = self.client.clone();
        let duration = started.elapsed().as_secs_f64();
        tokio::spawn(async move {
            let probe = CloudHttpProvider {
                client,
                base_url,
                api_key,
                model: provider_model.clone(),
                retry_policy: RetryPolicy::default(),
            };
            let cost_usd = probe.query_cost(StageName::Scribe, &job_ref).await.unwrap_or(0.0);
            let _ = tx.send(UsageRecord {
                stage: StageName::Scribe,
                provider: "cloud".to_string(),
                model: provider_model,
                input_tokens: body.input_tokens,
                output_tokens: body.output_tokens,
                cost_usd,
                duration_seconds: duration,
                request_count: attempts,
            });
        });

        let boxed: BoxStream<'static, Result<SegmentEvent>> = stream::iter(segments).boxed();
        Ok(TranscribeCall { segments: boxed, usage: rx })
    }

    async fn release_upstream_cache(&self, handle: &str) -> Result<()> {
        let url = format!("{}/v1/media/{}", self.base_url, handle);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| map_transport_error(self, StageName::Shelve, e))?;
        if !response.status().is_success() {
            return Err(self.provider_error(StageName::Shelve, format!("cache release returned {}", response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl RefinementProvider for CloudHttpProvider {
    async fn refine(
        &self,
        input: RefinementInput<'_>,
        schema: &BTreeMap<String, FieldSpec>,
        language_hint: &LanguageHint,
        cancel: CancellationToken,
    ) -> Result<(serde_json::Map<String, serde_json::Value>, UsageRecord)> {
        let url = format!("{}/v1/refine", self.base_url);
        let language = match language_hint {
            LanguageHint::Auto => None,
            LanguageHint::Explicit(code) => Some(code.clone()),
        };
        let body = match input {
            RefinementInput::TextTranscript(text) => {
                serde_json::json!({ "model": self.model, "language": language, "schema": schema, "transcript": text })
            }
            RefinementInput::AudioHandle { upstream_cache_handle, uploaded_uri } => serde_json::json!({
                "model": self.model,
                "language": language,
                "schema": schema,
                "media_ref": upstream_cache_handle.or(uploaded_uri),
            }),
        };

        let policy = self.retry_policy;
        let started = std::time::Instant::now();
        let (result, attempts) = retry_transient("cloud.refine", policy, || {
            let url = url.clone();
            let body = body.clone();
            let cancel = cancel.clone();
            async move {
                let response = tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled(StageName::Refine)),
                    result = self.client.post(&url).bearer_auth(&self.api_key).json(&body).send() => {
                        result.map_err(|e| map_transport_error(self, StageName::Refine, e))?
                    }
                };
                if !response.status().is_success() {
                    return Err(self.provider_error(StageName::Refine, status_cause(response.status())));
                }
                response
                    .json::<RefineResponse>()
                    .await
                    .map_err(|e| self.provider_error(StageName::Refine, format!("malformed refine response: {e}")))
            }
        })
        .await;
        let parsed = result?;

        let cost_usd = self.query_cost(StageName::Refine, &parsed.job_ref).await.unwrap_or(0.0);
        let usage = UsageRecord {
            stage: StageName::Refine,
            provider: "cloud".to_string(),
            model: self.model.clone(),
            input_tokens: parsed.input_tokens,
            output_tokens: parsed.output_tokens,
            cost_usd,
            duration_seconds: started.elapsed().as_secs_f64(),
            request_count: attempts,
        };
        Ok((parsed.fields, usage))
    }
}
