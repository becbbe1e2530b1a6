//! The external media tool seam used by INGEST. Audio encoding itself is out
//! of scope (§1); this crate only shells out to a pre-existing tool and
//! parses its output, the same "process spawn + stdout capture" shape as the
//! `local` provider.

use async_trait::async_trait;

use crate::domain::CompressionMode;
use crate::error::StageName;
use crate::providers::process_util;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub format: String,
    pub bitrate_kbps: u32,
}

#[async_trait]
pub trait MediaTool: Send + Sync {
    async fn probe(&self, source_path: &str) -> Result<MediaInfo>;

    /// Produce a working copy at `dest_path` per `mode`; `Original` is a
    /// plain copy, the other two modes re-encode via the external tool.
    /// Returns `dest_path`'s final extension-qualified path.
    async fn transform(&self, source_path: &str, dest_path: &str, mode: CompressionMode) -> Result<String>;
}

fn probe_error(cause: impl std::fmt::Display) -> Error {
    Error::Provider { stage: StageName::Ingest, provider: "ffprobe".to_string(), model: "n/a".to_string(), cause: cause.to_string(), source: None }
}

fn transform_error(cause: impl std::fmt::Display) -> Error {
    Error::Provider { stage: StageName::Ingest, provider: "ffmpeg".to_string(), model: "n/a".to_string(), cause: cause.to_string(), source: None }
}

/// Shells out to `ffprobe`/`ffmpeg`; the binaries are resolved from `$PATH`.
pub struct FfmpegMediaTool {
    pub ffprobe_binary: String,
    pub ffmpeg_binary: String,
}

impl Default for FfmpegMediaTool {
    fn default() -> Self {
        Self { ffprobe_binary: "ffprobe".to_string(), ffmpeg_binary: "ffmpeg".to_string() }
    }
}

#[derive(serde::Deserialize)]
struct FfprobeFormat {
    duration: String,
    format_name: String,
    #[serde(default)]
    bit_rate: Option<String>,
}

#[derive(serde::Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[async_trait]
impl MediaTool for FfmpegMediaTool {
    async fn probe(&self, source_path: &str) -> Result<MediaInfo> {
        let output = process_util::tokio_command(&self.ffprobe_binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", source_path])
            .output()
            .await
            .map_err(|e| probe_error(format!("failed to spawn ffprobe: {e}")))?;
        if !output.status.success() {
            return Err(probe_error(format!("ffprobe exited with {}", output.status)));
        }
        let parsed: FfprobeOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| probe_error(format!("malformed ffprobe output: {e}")))?;
        let duration_seconds: f64 = parsed.format.duration.parse().map_err(|_| probe_error("ffprobe returned a non-numeric duration"))?;
        let bitrate_kbps = parsed
            .format
            .bit_rate
            .and_then(|s| s.parse::<u64>().ok())
            .map(|bps| (bps / 1000) as u32)
            .unwrap_or(0);
        Ok(MediaInfo { duration_seconds, format: parsed.format.format_name, bitrate_kbps })
    }

    async fn transform(&self, source_path: &str, dest_path: &str, mode: CompressionMode) -> Result<String> {
        match mode {
            CompressionMode::Original => {
                tokio::fs::copy(source_path, dest_path)
                    .await
                    .map_err(|e| Error::io_path("copying source media", dest_path, e))?;
                Ok(dest_path.to_string())
            }
            CompressionMode::Compressed | CompressionMode::Optimized => {
                let mut cmd = process_util::tokio_command(&self.ffmpeg_binary);
                cmd.args(["-y", "-i", source_path, "-c:a", "libopus", "-b:a", "24k"]);
                if mode == CompressionMode::Optimized {
                    cmd.args(["-af", "silenceremove=1:0:-50dB"]);
                }
                cmd.arg(dest_path);
                let status = cmd.status().await.map_err(|e| transform_error(format!("failed to spawn ffmpeg: {e}")))?;
                if !status.success() {
                    return Err(transform_error(format!("ffmpeg exited with {status}")));
                }
                Ok(dest_path.to_string())
            }
        }
    }
}
