//! Atomic JSON read/write helpers shared by the job store.
//!
//! All mutations of `state.json` and `meta.json` go through
//! [`write_json_atomic`]: write to a sibling temp file, then rename, so a
//! crash mid-write can never leave a torn file behind. Readers retry once on
//! parse failure, matching the "tolerate a corrupt file" contract in §4.1.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::Result;

fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> Error {
    Error::io_path(op, path, source)
}

pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("creating parent directory", parent, e))?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| io_error("writing temp file", &tmp_path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| io_error("renaming into place", path, e))?;
    Ok(())
}

/// Read and parse a JSON file, retrying once after a short yield if the first
/// parse fails (guards against reading a file mid-rename on some filesystems).
pub async fn read_json_retrying<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| io_error("reading file", path, e))?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(_) => {
            tokio::task::yield_now().await;
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| io_error("reading file (retry)", path, e))?;
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

pub async fn path_exists_nonempty(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}
