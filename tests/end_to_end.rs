//! End-to-end scenario tests driving the full pipeline against a fake media
//! tool and a scripted HTTP stand-in for the `cloud` reference provider.

mod support;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use scribeforge::domain::{
    ArtifactSpec, CompressionMode, Configuration, JobStatus, LanguageHint, ProviderChoice, ShelveMode, StageStatus,
};
use scribeforge::error::StageName;
use scribeforge::Error;

use support::{FakeCloudServer, Fixture};

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

fn transcribe_body() -> String {
    json!({
        "job_ref": "job-abc123",
        "detected_language": "en",
        "segments": [
            {"speaker_id": "spk0", "start": 0.0, "end": 5.0, "text": "Let's get started.", "confidence": 0.95},
            {"speaker_id": "spk1", "start": 5.0, "end": 12.0, "text": "Sounds good to me.", "confidence": 0.9}
        ],
        "input_tokens": 120,
        "output_tokens": 40
    })
    .to_string()
}

fn refine_body() -> String {
    json!({
        "job_ref": "job-abc123",
        "fields": {
            "detected_language": "en",
            "summary": "A concise recap of the meeting.",
            "key_takeaways": ["Ship the v2 API by Friday", "Budget signoff is still pending"],
            "action_items": ["Ship the v2 API by Friday"]
        },
        "input_tokens": 200,
        "output_tokens": 80
    })
    .to_string()
}

fn usage_body(cost_usd: f64) -> String {
    json!({ "cost_usd": cost_usd }).to_string()
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
async fn happy_path_text_grounded_run_completes_all_five_stages() {
    let roots = Roots::new();
    support::write_markdown_template(roots.templates.path()).await;
    support::write_cloud_descriptor(roots.providers.path(), "cloud_s1", "CLOUD_S1_API_KEY").await;

    let server = FakeCloudServer::start(vec![(200, transcribe_body())], vec![(200, refine_body())], usage_body(0.0123)).await;
    unsafe {
        std::env::set_var("CLOUD_S1_API_KEY", "test-key");
        std::env::set_var("CLOUD_S1_BASE_URL", server.base_url());
    }

    let source_path = roots.source.path().join("meeting.mp3");
    support::write_source_file(&source_path, b"not really audio, just needs to be non-empty").await;

    let fixture = fixture_for(&roots).await;
    let (job, outcome) = fixture
        .driver
        .run(source_path.to_str().unwrap(), base_config("cloud_s1"), None, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.job_finalized);
    assert!(outcome.halted_at.is_none());
    for stage in StageName::ORDER {
        assert_eq!(job.state.record(stage).status, StageStatus::Completed, "{stage} should have completed");
    }
    assert_eq!(job.status(), JobStatus::Completed);
    assert!(job.meta.processing.total_cost_usd > 0.0);
    assert_eq!(job.meta.processing.request_count, 2);

    let now = job.state.updated_at;
    let dest_dir = roots
        .results
        .path()
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(now.format("%d").to_string())
        .join(&job.id);
    let rendered = tokio::fs::read_to_string(dest_dir.join("summary.md")).await.unwrap();
    assert!(rendered.contains("A concise recap of the meeting."));
    assert!(rendered.contains("- Ship the v2 API by Friday"));

    for dir in [job.paths.media_dir(), job.paths.transcripts_dir(), job.paths.artifacts_dir()] {
        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none(), "{} should be emptied after shelving", dir.display());
    }
}

#[tokio::test]
async fn stop_after_scribe_then_retry_completes_remaining_stages() {
    let roots = Roots::new();
    support::write_markdown_template(roots.templates.path()).await;
    support::write_cloud_descriptor(roots.providers.path(), "cloud_s2", "CLOUD_S2_API_KEY").await;

    let server = FakeCloudServer::start(vec![(200, transcribe_body())], vec![(200, refine_body())], usage_body(0.02)).await;
    unsafe {
        std::env::set_var("CLOUD_S2_API_KEY", "test-key");
        std::env::set_var("CLOUD_S2_BASE_URL", server.base_url());
    }

    let source_path = roots.source.path().join("meeting.mp3");
    support::write_source_file(&source_path, b"not really audio either").await;

    let fixture = fixture_for(&roots).await;
    let (job, outcome) = fixture
        .driver
        .run(source_path.to_str().unwrap(), base_config("cloud_s2"), Some(StageName::Scribe), CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.job_finalized);
    assert!(outcome.halted_at.is_none());
    assert_eq!(job.state.record(StageName::Ingest).status, StageStatus::Completed);
    assert_eq!(job.state.record(StageName::Scribe).status, StageStatus::Completed);
    assert_eq!(job.state.record(StageName::Refine).status, StageStatus::Pending);
    assert_eq!(job.state.record(StageName::Generate).status, StageStatus::Pending);
    assert_eq!(job.state.record(StageName::Shelve).status, StageStatus::Pending);
    assert!(tokio::fs::try_exists(job.paths.raw_transcript_file()).await.unwrap());
    assert!(job.paths.root.is_dir());

    // Scenario 3: retry resumes from REFINE and must pick the transcript back
    // up from disk rather than treating it as absent (the fix to `driver.rs`).
    let (job, outcome) = fixture.driver.retry(job, None, None, CancellationToken::new()).await.unwrap();
    assert!(outcome.job_finalized);
    for stage in StageName::ORDER {
        assert_eq!(job.state.record(stage).status, StageStatus::Completed, "{stage} should have completed after retry");
    }

    let now = job.state.updated_at;
    let dest_dir = roots
        .results
        .path()
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(now.format("%d").to_string())
        .join(&job.id);
    assert!(tokio::fs::try_exists(dest_dir.join("summary.md")).await.unwrap());
}

#[tokio::test]
async fn direct_mode_without_transcript_skips_subtitles() {
    let roots = Roots::new();
    support::write_markdown_template(roots.templates.path()).await;
    support::write_subtitles_template(roots.templates.path()).await;
    support::write_cloud_descriptor(roots.providers.path(), "cloud_s4", "CLOUD_S4_API_KEY").await;

    let server = FakeCloudServer::start(vec![], vec![(200, refine_body())], usage_body(0.01)).await;
    unsafe {
        std::env::set_var("CLOUD_S4_API_KEY", "test-key");
        std::env::set_var("CLOUD_S4_BASE_URL", server.base_url());
    }

    let source_path = roots.source.path().join("lecture.mp3");
    support::write_source_file(&source_path, b"lecture audio bytes").await;

    let mut config = base_config("cloud_s4");
    config.skip_transcript = true;
    config.artifacts.push(ArtifactSpec { plugin: "subtitles".to_string(), template: "webvtt".to_string(), filename_override: None });

    let fixture = fixture_for(&roots).await;
    let (job, outcome) = fixture
        .driver
        .run(source_path.to_str().unwrap(), config, None, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.job_finalized);
    assert_eq!(job.state.record(StageName::Scribe).status, StageStatus::Skipped);
    assert_eq!(job.state.record(StageName::Refine).status, StageStatus::Completed);
    assert_eq!(job.state.record(StageName::Generate).status, StageStatus::Completed);
    assert_eq!(job.state.record(StageName::Shelve).status, StageStatus::Completed);

    let detail_bytes = tokio::fs::read(job.paths.stage_detail_file(StageName::Generate)).await.unwrap();
    let skipped: serde_json::Value = serde_json::from_slice(&detail_bytes).unwrap();
    let skipped = skipped.as_array().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["plugin"], "subtitles");
    assert_eq!(skipped[0]["reason"], "NoTranscriptForSubtitles");
}

#[tokio::test]
async fn rate_limited_scribe_call_retries_and_succeeds() {
    let roots = Roots::new();
    support::write_markdown_template(roots.templates.path()).await;
    support::write_cloud_descriptor(roots.providers.path(), "cloud_s5", "CLOUD_S5_API_KEY").await;

    let server = FakeCloudServer::start(
        vec![(429, "{}".to_string()), (200, transcribe_body())],
        vec![(200, refine_body())],
        usage_body(0.01),
    )
    .await;
    unsafe {
        std::env::set_var("CLOUD_S5_API_KEY", "test-key");
        std::env::set_var("CLOUD_S5_BASE_URL", server.base_url());
    }

    let source_path = roots.source.path().join("call.mp3");
    support::write_source_file(&source_path, b"call recording bytes").await;

    let fixture = fixture_for(&roots).await;
    let (job, outcome) = fixture
        .driver
        .run(source_path.to_str().unwrap(), base_config("cloud_s5"), Some(StageName::Scribe), CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.halted_at.is_none());
    assert_eq!(job.state.record(StageName::Scribe).status, StageStatus::Completed);
    assert_eq!(job.meta.processing.request_count, 2);
}

#[tokio::test]
async fn conflicting_template_schemas_fail_before_job_creation() {
    let roots = Roots::new();
    support::write_local_descriptor(roots.providers.path()).await;

    let markdown_dir = roots.templates.path().join("markdown");
    tokio::fs::create_dir_all(&markdown_dir).await.unwrap();
    tokio::fs::write(
        markdown_dir.join("summary.yaml"),
        "extension: md\ncustom_fields:\n  participants:\n    description: speakers\n    structure:\n      array: string\n",
    )
    .await
    .unwrap();
    tokio::fs::write(
        markdown_dir.join("notes.yaml"),
        "extension: md\ncustom_fields:\n  participants:\n    description: speakers\n    structure: string\n",
    )
    .await
    .unwrap();

    let source_path = roots.source.path().join("standup.mp3");
    support::write_source_file(&source_path, b"standup recording bytes").await;

    let mut config = base_config("local");
    config.artifacts = vec![
        ArtifactSpec { plugin: "markdown".to_string(), template: "summary".to_string(), filename_override: None },
        ArtifactSpec { plugin: "markdown".to_string(), template: "notes".to_string(), filename_override: None },
    ];

    let fixture = fixture_for(&roots).await;
    let err = fixture
        .driver
        .run(source_path.to_str().unwrap(), config, None, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TemplateSchemaConflict { .. }));

    let mut entries = tokio::fs::read_dir(roots.work.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none(), "no job directory should be created on schema conflict");
}
