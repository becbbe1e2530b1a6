//! Shared fixtures for the end-to-end scenario tests: a no-op media tool plus
//! a hand-rolled HTTP/1.1 stub standing in for the `cloud` reference
//! provider's backend, so SCRIBE/REFINE exercise the real wire contract in
//! `src/providers/cloud_http.rs` without a network dependency.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use scribeforge::domain::CompressionMode;
use scribeforge::pipeline::media::{MediaInfo, MediaTool};
use scribeforge::plugins::PluginRegistry;
use scribeforge::providers::ProviderRegistry;
use scribeforge::store::FsJobStore;
use scribeforge::templates::TemplateRegistry;
use scribeforge::pipeline::{PipelineContext, PipelineDriver};
use scribeforge::Result;

/// Stands in for `ffprobe`/`ffmpeg`: reports a fixed duration and copies the
/// source byte-for-byte regardless of the requested compression mode.
pub struct FakeMediaTool {
    pub duration_seconds: f64,
}

impl Default for FakeMediaTool {
    fn default() -> Self {
        Self { duration_seconds: 120.0 }
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn probe(&self, source_path: &str) -> Result<MediaInfo> {
        if !Path::new(source_path).metadata().map(|m| m.len() > 0).unwrap_or(false) {
            return Err(scribeforge::Error::validation(format!("source {source_path} is empty or missing")));
        }
        Ok(MediaInfo { duration_seconds: self.duration_seconds, format: "wav".to_string(), bitrate_kbps: 128 })
    }

    async fn transform(&self, source_path: &str, dest_path: &str, _mode: CompressionMode) -> Result<String> {
        tokio::fs::copy(source_path, dest_path).await.map_err(|e| scribeforge::Error::io_path("copying fake media", dest_path, e))?;
        Ok(dest_path.to_string())
    }
}

/// A queued (status, body) pair, consumed in order as requests arrive.
type Scripted = Mutex<VecDeque<(u16, String)>>;

pub struct FakeCloudServer {
    addr: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

struct Routes {
    transcribe: Scripted,
    refine: Scripted,
    usage_body: String,
}

impl Routes {
    fn respond(&self, path: &str) -> (u16, String) {
        if path.starts_with("/v1/transcribe") {
            self.transcribe.lock().unwrap().pop_front().unwrap_or((500, "{}".to_string()))
        } else if path.starts_with("/v1/refine") {
            self.refine.lock().unwrap().pop_front().unwrap_or((500, "{}".to_string()))
        } else if path.starts_with("/v1/usage/") {
            (200, self.usage_body.clone())
        } else {
            (404, "{}".to_string())
        }
    }
}

impl FakeCloudServer {
    /// `transcribe_script`/`refine_script` are consumed one entry per call;
    /// once exhausted, further calls get a 500 so a test can't silently pass
    /// on more calls than it intended.
    pub async fn start(transcribe_script: Vec<(u16, String)>, refine_script: Vec<(u16, String)>, usage_body: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake cloud server");
        let addr = listener.local_addr().expect("local addr");
        let routes = Arc::new(Routes {
            transcribe: Mutex::new(transcribe_script.into()),
            refine: Mutex::new(refine_script.into()),
            usage_body,
        });
        let handle = tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let routes = routes.clone();
                tokio::spawn(serve_one(socket, routes));
            }
        });
        Self { addr, _handle: handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn serve_one(mut socket: TcpStream, routes: Arc<Routes>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > 1 << 20 {
            return;
        }
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let content_length: usize = lines
        .find_map(|line| line.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    let (status, body) = routes.respond(&path);
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Writes `<root>/<name>/defaults.yaml` declaring a cloud provider capable of
/// both transcription and refinement, with its API key env var and base URL
/// resolved the way `ProviderRegistry::build_cloud` expects.
///
/// `name` must be unique per test binary run: the base URL is picked up from
/// `<NAME>_BASE_URL`, a process-wide env var, so two tests sharing a provider
/// name racing in parallel would stomp on each other's backend address.
pub async fn write_cloud_descriptor(providers_root: &Path, name: &str, api_key_env: &str) {
    let dir = providers_root.join(name);
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let yaml = format!(
        "name: {name}\ndisplay_name: Cloud\ntype: cloud\ncapabilities: [transcription, refinement]\napi_key_requirement: {api_key_env}\nmodels: [standard]\n"
    );
    tokio::fs::write(dir.join("defaults.yaml"), yaml).await.unwrap();
}

pub async fn write_local_descriptor(providers_root: &Path) {
    let dir = providers_root.join("local");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(
        dir.join("defaults.yaml"),
        "name: local\ndisplay_name: Local\ntype: local\ncapabilities: [transcription, refinement]\napi_key_requirement: null\nmodels: [base]\n",
    )
    .await
    .unwrap();
}

pub async fn write_markdown_template(templates_root: &Path) {
    let dir = templates_root.join("markdown");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(
        dir.join("summary.yaml"),
        "extension: md\ncustom_fields:\n  summary:\n    description: short summary\n    structure: string\n  key_takeaways:\n    description: key points\n    structure:\n      array: string\n  action_items:\n    description: follow ups\n    structure:\n      array: string\n",
    )
    .await
    .unwrap();
}

pub async fn write_subtitles_template(templates_root: &Path) {
    let dir = templates_root.join("subtitles");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("webvtt.yaml"), "extension: vtt\n").await.unwrap();
}

pub struct Fixture {
    pub work_root: PathBuf,
    pub results_root: PathBuf,
    pub driver: PipelineDriver,
}

impl Fixture {
    pub async fn build(providers_root: &Path, templates_root: &Path, work_root: PathBuf, results_root: PathBuf) -> Self {
        let store: Arc<dyn scribeforge::store::JobStore> = Arc::new(FsJobStore::new(&work_root));
        let providers = Arc::new(ProviderRegistry::discover(providers_root).await.unwrap());
        let templates = Arc::new(TemplateRegistry::discover(templates_root).unwrap());
        let plugins = Arc::new(PluginRegistry::with_reference_plugins());
        let media_tool = Arc::new(FakeMediaTool::default());
        let ctx = PipelineContext { store, providers, templates, plugins, media_tool, results_root: results_root.clone() };
        Self { work_root, results_root, driver: PipelineDriver::new(ctx) }
    }
}

pub async fn write_source_file(path: &Path, bytes: &[u8]) {
    tokio::fs::write(path, bytes).await.unwrap();
}
