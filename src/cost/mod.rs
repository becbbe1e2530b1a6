//! Usage/cost reporting across the working root (`report --days N`, §6).

use chrono::Utc;

use crate::store::{JobFilter, JobStore};
use crate::Result;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FleetReport {
    pub jobs_considered: usize,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub total_time_seconds: f64,
    pub request_count: u32,
    pub by_provider: std::collections::BTreeMap<String, f64>,
}

/// Aggregate `meta.processing` totals across every job updated within the
/// last `days` days (or every job, if `days` is `None`).
pub async fn build_report(store: &dyn JobStore, days: Option<i64>) -> Result<FleetReport> {
    let since = days.map(|d| Utc::now() - chrono::Duration::days(d));
    let filter = JobFilter { status: None, since };
    let jobs = store.list(&filter).await?;

    let mut report = FleetReport::default();
    report.jobs_considered = jobs.len();
    for job in &jobs {
        let totals = &job.meta.processing;
        report.total_tokens += totals.total_tokens;
        report.total_cost_usd = crate::domain::usage::round4(report.total_cost_usd + totals.total_cost_usd);
        report.total_time_seconds += totals.total_time_seconds;
        report.request_count += totals.request_count;
        let entry = report.by_provider.entry(job.meta.configuration.transcription.provider.clone()).or_insert(0.0);
        *entry = crate::domain::usage::round4(*entry + totals.total_cost_usd);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactSpec, CompressionMode, Configuration, LanguageHint, ProviderChoice, ShelveMode, UsageRecord};
    use crate::error::StageName;
    use crate::store::FsJobStore;

    fn test_config() -> Configuration {
        Configuration {
            transcription: ProviderChoice { provider: "local".into(), model: "base".into() },
            refinement: ProviderChoice { provider: "local".into(), model: "base".into() },
            compression_mode: CompressionMode::Compressed,
            language_hint: LanguageHint::Auto,
            artifacts: vec![ArtifactSpec { plugin: "markdown".into(), template: "summary".into(), filename_override: None }],
            shelve_mode: ShelveMode::Timeline,
            skip_transcript: false,
            debug: false,
        }
    }

    #[tokio::test]
    async fn aggregates_cost_across_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsJobStore::new(dir.path());
        let mut job = store.create("a.mp3", test_config(), Utc::now()).await.unwrap();
        job.meta.processing.accumulate(&UsageRecord {
            stage: StageName::Scribe,
            provider: "local".into(),
            model: "base".into(),
            input_tokens: 100,
            output_tokens: 50,
            cost_usd: 0.01,
            duration_seconds: 2.0,
            request_count: 1,
        });
        store.save(&job).await.unwrap();

        let report = build_report(&store, None).await.unwrap();
        assert_eq!(report.jobs_considered, 1);
        assert_eq!(report.total_tokens, 150);
        assert!((report.total_cost_usd - 0.01).abs() < 1e-9);
        assert_eq!(report.by_provider.get("local"), Some(&0.01));
    }
}
