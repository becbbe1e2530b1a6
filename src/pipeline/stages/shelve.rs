//! SHELVE: copy artifacts into the results library per the shelving
//! strategy, then (unless debug) prune heavy job-directory contents (§4.3).

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::ids::slugify;
use crate::domain::{IngestResult, ShelveMode};
use crate::pipeline::PipelineContext;
use crate::store::Job;
use crate::Result;

fn timeline_dest(results_root: &std::path::Path, now: DateTime<Utc>, job_id: &str) -> std::path::PathBuf {
    results_root
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(now.format("%d").to_string())
        .join(job_id)
}

fn flat_dest(results_root: &std::path::Path, context_tag: Option<&str>) -> std::path::PathBuf {
    match context_tag {
        Some(tag) => results_root.join(tag),
        None => results_root.join("Inbox"),
    }
}

/// Renames an artifact for flat/zettelkasten placement: `{date}-{title}-{id}-{original_stem}{ext}`.
/// `title` falls back to the source slug when the enriched context has none; the original stem
/// is kept so two artifacts sharing an extension (e.g. two markdown templates) never collide.
fn flat_filename(job_id: &str, slug: &str, date: &str, title: Option<&str>, original_name: &std::path::Path) -> String {
    let title_part = title.map(slugify).unwrap_or_else(|| slug.to_string());
    let stem = original_name.file_stem().and_then(|s| s.to_str()).unwrap_or("artifact");
    let base = format!("{date}-{title_part}-{job_id}-{stem}");
    match original_name.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

pub async fn run(ctx: &PipelineContext, job: &mut Job) -> Result<std::path::PathBuf> {
    let now = job.state.updated_at;
    let context = load_context(&job.paths.enriched_context_file()).await;
    let context_tag = context.as_ref().and_then(|v| v.get("tag")).and_then(|v| v.as_str());
    let context_title = context.as_ref().and_then(|v| v.get("title")).and_then(|v| v.as_str());

    let dest_dir = match job.meta.configuration.shelve_mode {
        ShelveMode::Timeline => timeline_dest(&ctx.results_root, now, &job.id),
        ShelveMode::Flat | ShelveMode::Zettelkasten => flat_dest(&ctx.results_root, context_tag),
    };
    tokio::fs::create_dir_all(&dest_dir).await.map_err(|e| crate::Error::io_path("creating results directory", &dest_dir, e))?;

    let slug = slugify(
        std::path::Path::new(&job.meta.source).file_stem().and_then(|s| s.to_str()).unwrap_or(&job.meta.source),
    );
    let date = now.format("%Y-%m-%d").to_string();
    let flat = matches!(job.meta.configuration.shelve_mode, ShelveMode::Flat | ShelveMode::Zettelkasten);

    let mut entries = tokio::fs::read_dir(job.paths.artifacts_dir())
        .await
        .map_err(|e| crate::Error::io_path("reading artifacts directory", job.paths.artifacts_dir(), e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| crate::Error::io_path("reading artifacts entry", job.paths.artifacts_dir(), e))?
    {
        if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let filename: std::ffi::OsString = if flat {
            flat_filename(&job.id, &slug, &date, context_title, std::path::Path::new(&entry.file_name())).into()
        } else {
            entry.file_name()
        };
        let dest = dest_dir.join(&filename);
        tokio::fs::copy(entry.path(), &dest).await.map_err(|e| crate::Error::io_path("copying artifact to results", &dest, e))?;
    }

    release_upstream_cache(ctx, job).await;

    if !job.meta.configuration.debug {
        prune_dir(&job.paths.media_dir()).await?;
        prune_dir(&job.paths.transcripts_dir()).await?;
        prune_dir(&job.paths.artifacts_dir()).await?;
    }

    Ok(dest_dir)
}

/// Best-effort release of the upstream provider cache handle INGEST may have
/// populated for media ≥5 minutes (§5 "Shared resources"). Failure to reach
/// the provider or to release the handle is logged and otherwise ignored —
/// SHELVE must still finalize the job either way.
async fn release_upstream_cache(ctx: &PipelineContext, job: &Job) {
    let ingest = match tokio::fs::read(job.paths.ingest_file()).await {
        Ok(bytes) => match serde_json::from_slice::<IngestResult>(&bytes) {
            Ok(ingest) => ingest,
            Err(_) => return,
        },
        Err(_) => return,
    };
    let Some(handle) = ingest.upstream_cache_handle.as_ref() else {
        return;
    };

    let transcription = &job.meta.configuration.transcription;
    match ctx.providers.get_transcription(&transcription.provider, &transcription.model) {
        Ok(provider) => {
            if let Err(err) = provider.release_upstream_cache(handle).await {
                warn!(job_id = %job.id, handle, error = %err, "failed to release upstream cache handle");
            }
        }
        Err(err) => {
            warn!(job_id = %job.id, error = %err, "could not resolve transcription provider to release upstream cache handle");
        }
    }
}

async fn prune_dir(dir: &std::path::Path) -> Result<()> {
    if dir.is_dir() {
        tokio::fs::remove_dir_all(dir).await.map_err(|e| crate::Error::io_path("pruning working directory", dir, e))?;
        tokio::fs::create_dir_all(dir).await.map_err(|e| crate::Error::io_path("recreating pruned directory", dir, e))?;
    }
    Ok(())
}

/// Loads the enriched context as a bare JSON value for routing/renaming:
/// `tag` drives flat/zettelkasten subdirectory placement, `title` feeds the
/// flat filename pattern. Either may be absent; both fall back gracefully.
async fn load_context(enriched_context_path: &std::path::Path) -> Option<serde_json::Value> {
    let bytes = tokio::fs::read(enriched_context_path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}
