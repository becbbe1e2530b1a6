//! Boundary-behavior tests (§8): conditions at the edge of a stage's
//! prerequisites, rather than full scenario runs.

mod support;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use scribeforge::domain::{ArtifactSpec, CompressionMode, Configuration, LanguageHint, ProviderChoice, ShelveMode, StageStatus};
use scribeforge::domain::TranscriptSegment;
use scribeforge::error::StageName;
use scribeforge::providers::{drain_segments, SegmentEvent};

use support::{FakeCloudServer, Fixture};

fn transcribe_body() -> String {
    json!({
        "job_ref": "job-boundary",
        "detected_language": "en",
        "segments": [
            {"speaker_id": "spk0", "start": 0.0, "end": 5.0, "text": "Morning all.", "confidence": 0.95}
        ],
        "input_tokens": 50,
        "output_tokens": 10
    })
    .to_string()
}

fn refine_body() -> String {
    json!({
        "job_ref": "job-boundary",
        "fields": {
            "detected_language": "en",
            "clean_text": "Morning all.",
            "summary": "A brief standup.",
            "key_takeaways": [],
            "participants": [],
            "quotes": [],
            "action_items": []
        },
        "input_tokens": 60,
        "output_tokens": 20
    })
    .to_string()
}

fn usage_body(cost_usd: f64) -> String {
    json!({ "cost_usd": cost_usd }).to_string()
}

fn base_config(provider: &str) -> Configuration {
    Configuration {
        transcription: ProviderChoice { provider: provider.to_string(), model: "standard".to_string() },
        refinement: ProviderChoice { provider: provider.to_string(), model: "standard".to_string() },
        compression_mode: CompressionMode::Compressed,
        language_hint: LanguageHint::Auto,
        artifacts: vec![ArtifactSpec { plugin: "markdown".to_string(), template: "summary".to_string(), filename_override: None }],
        shelve_mode: ShelveMode::Timeline,
        skip_transcript: false,
        debug: false,
    }
}

struct Roots {
    work: tempfile::TempDir,
    results: tempfile::TempDir,
    providers: tempfile::TempDir,
    templates: tempfile::TempDir,
    source: tempfile::TempDir,
}

impl Roots {
    fn new() -> Self {
        Self {
            work: tempfile::tempdir().unwrap(),
            results: tempfile::tempdir().unwrap(),
            providers: tempfile::tempdir().unwrap(),
            templates: tempfile::tempdir().unwrap(),
            source: tempfile::tempdir().unwrap(),
        }
    }
}

async fn fixture_for(roots: &Roots) -> Fixture {
    Fixture::build(
        roots.providers.path(),
        roots.templates.path(),
        roots.work.path().to_path_buf(),
        roots.results.path().to_path_buf(),
    )
    .await
}

#[tokio::test]
async fn empty_source_file_fails_ingest_with_file_empty_before_any_provider_call() {
    let roots = Roots::new();
    support::write_markdown_template(roots.templates.path()).await;
    support::write_local_descriptor(roots.providers.path()).await;

    let source_path = roots.source.path().join("silence.mp3");
    support::write_source_file(&source_path, b"").await;

    let fixture = fixture_for(&roots).await;
    let (job, outcome) =
        fixture.driver.run(source_path.to_str().unwrap(), base_config("local"), None, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.halted_at, Some(StageName::Ingest));
    assert_eq!(job.state.record(StageName::Ingest).status, StageStatus::Failed);
    let detail = job.state.record(StageName::Ingest).error.as_ref().unwrap();
    assert!(detail.contains("FileEmpty"), "expected FileEmpty in {detail}");
}

#[tokio::test]
async fn missing_source_file_fails_ingest_with_file_missing() {
    let roots = Roots::new();
    support::write_markdown_template(roots.templates.path()).await;
    support::write_local_descriptor(roots.providers.path()).await;

    let source_path = roots.source.path().join("never-written.mp3");

    let fixture = fixture_for(&roots).await;
    let (job, outcome) =
        fixture.driver.run(source_path.to_str().unwrap(), base_config("local"), None, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.halted_at, Some(StageName::Ingest));
    let detail = job.state.record(StageName::Ingest).error.as_ref().unwrap();
    assert!(detail.contains("FileMissing"), "expected FileMissing in {detail}");
}

#[tokio::test]
async fn short_source_is_not_eligible_for_upstream_cache() {
    use scribeforge::domain::ingest::IngestResult;

    let result = IngestResult {
        source_path: "clip.mp3".to_string(),
        working_copy_path: "clip.mp3".to_string(),
        compressed_path: None,
        duration_seconds: 12.0,
        format: "mp3".to_string(),
        bitrate_kbps: 128,
        upstream_cache_handle: None,
        uploaded_uri: None,
    };
    assert!(!result.eligible_for_upstream_cache());
}

#[tokio::test]
async fn empty_artifact_list_writes_nothing_and_shelve_fails_with_no_artifacts() {
    let roots = Roots::new();
    support::write_markdown_template(roots.templates.path()).await;
    support::write_cloud_descriptor(roots.providers.path(), "cloud_bb1", "CLOUD_BB1_API_KEY").await;

    let server = FakeCloudServer::start(vec![(200, transcribe_body())], vec![(200, refine_body())], usage_body(0.01)).await;
    unsafe {
        std::env::set_var("CLOUD_BB1_API_KEY", "test-key");
        std::env::set_var("CLOUD_BB1_BASE_URL", server.base_url());
    }

    let source_path = roots.source.path().join("standup.mp3");
    support::write_source_file(&source_path, b"standup recording bytes").await;

    let mut config = base_config("cloud_bb1");
    config.artifacts = vec![];

    let fixture = fixture_for(&roots).await;
    let (job, outcome) =
        fixture.driver.run(source_path.to_str().unwrap(), config, None, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.halted_at, Some(StageName::Shelve));
    assert_eq!(job.state.record(StageName::Generate).status, StageStatus::Completed);
    assert_eq!(job.state.record(StageName::Shelve).status, StageStatus::Failed);

    let mut entries = tokio::fs::read_dir(job.paths.artifacts_dir()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none(), "GENERATE should have written no files");

    let detail = job.state.record(StageName::Shelve).error.as_ref().unwrap();
    assert!(detail.contains("NoArtifacts"), "expected NoArtifacts in {detail}");
}

#[tokio::test]
async fn out_of_order_segment_is_rejected_by_the_drain_helper() {
    let segment = TranscriptSegment {
        speaker_id: "spk0".to_string(),
        start_time: 5.0,
        end_time: 2.0,
        text: "broken".to_string(),
        confidence: None,
    };
    let events: Vec<scribeforge::Result<SegmentEvent>> = vec![Ok(SegmentEvent::Segment(segment))];
    let boxed: futures::stream::BoxStream<'static, scribeforge::Result<SegmentEvent>> = Box::pin(futures::stream::iter(events));
    let err = drain_segments(boxed).await.unwrap_err();
    assert!(matches!(err, scribeforge::Error::SegmentOrderingViolation { .. }));
}
