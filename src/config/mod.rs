//! Process-level configuration layering (§1, §3 expansion): compiled-in
//! defaults, overridden by an optional TOML file, then by `MEDIAFORGE_*`
//! environment variables, then by explicit CLI flags. Grounded in the same
//! "start from a base struct, apply `Some` overrides in precedence order"
//! shape as the reference implementation's config merger, generalized from
//! per-platform/per-template layers to defaults/file/env/CLI layers.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{CompressionMode, ProviderChoice, ShelveMode};
use crate::{Error, Result};

/// Process-wide settings, independent of any single job. A job's frozen
/// [`crate::domain::Configuration`] snapshot is derived from this plus
/// per-invocation CLI overrides at job-creation time (§9 design notes).
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub work_root: PathBuf,
    pub results_root: PathBuf,
    pub input_dir: PathBuf,
    pub providers_root: PathBuf,
    pub templates_root: PathBuf,
    pub default_transcription: ProviderChoice,
    pub default_refinement: ProviderChoice,
    pub default_compression_mode: CompressionMode,
    pub default_shelve_mode: ShelveMode,
    pub failed_jobs_retention_days: i64,
    pub completed_jobs_retention_days: i64,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("./work"),
            results_root: PathBuf::from("./results"),
            input_dir: PathBuf::from("./inbox"),
            providers_root: PathBuf::from("./resources/providers"),
            templates_root: PathBuf::from("./resources/templates"),
            default_transcription: ProviderChoice { provider: "local".to_string(), model: "base".to_string() },
            default_refinement: ProviderChoice { provider: "local".to_string(), model: "base".to_string() },
            default_compression_mode: CompressionMode::Compressed,
            default_shelve_mode: ShelveMode::Timeline,
            failed_jobs_retention_days: 7,
            completed_jobs_retention_days: 30,
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_string(),
        }
    }
}

/// The shape of `<config-dir>/config.toml`; every field optional so a
/// partial file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    work_root: Option<PathBuf>,
    results_root: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    providers_root: Option<PathBuf>,
    templates_root: Option<PathBuf>,
    default_transcription_provider: Option<String>,
    default_transcription_model: Option<String>,
    default_refinement_provider: Option<String>,
    default_refinement_model: Option<String>,
    default_compression_mode: Option<String>,
    default_shelve_mode: Option<String>,
    failed_jobs_retention_days: Option<i64>,
    completed_jobs_retention_days: Option<i64>,
    log_dir: Option<PathBuf>,
    log_level: Option<String>,
}

impl ProcessConfig {
    /// Load defaults, then apply the file at `config_path` (if it exists),
    /// then `MEDIAFORGE_*` environment variables. CLI flags are applied
    /// separately by the caller after this returns, since they arrive as
    /// already-parsed `clap` args rather than strings to re-parse.
    pub async fn load(config_path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = tokio::fs::read_to_string(config_path).await {
            let overrides: FileOverrides =
                toml::from_str(&raw).map_err(|e| Error::config(format!("invalid config file {}: {e}", config_path.display())))?;
            config.apply_file(overrides)?;
        }
        config.apply_env()?;
        Ok(config)
    }

    fn apply_file(&mut self, overrides: FileOverrides) -> Result<()> {
        if let Some(v) = overrides.work_root {
            self.work_root = v;
        }
        if let Some(v) = overrides.results_root {
            self.results_root = v;
        }
        if let Some(v) = overrides.input_dir {
            self.input_dir = v;
        }
        if let Some(v) = overrides.providers_root {
            self.providers_root = v;
        }
        if let Some(v) = overrides.templates_root {
            self.templates_root = v;
        }
        if let Some(v) = overrides.default_transcription_provider {
            self.default_transcription.provider = v;
        }
        if let Some(v) = overrides.default_transcription_model {
            self.default_transcription.model = v;
        }
        if let Some(v) = overrides.default_refinement_provider {
            self.default_refinement.provider = v;
        }
        if let Some(v) = overrides.default_refinement_model {
            self.default_refinement.model = v;
        }
        if let Some(v) = overrides.default_compression_mode {
            self.default_compression_mode = v.parse()?;
        }
        if let Some(v) = overrides.default_shelve_mode {
            self.default_shelve_mode = v.parse()?;
        }
        if let Some(v) = overrides.failed_jobs_retention_days {
            self.failed_jobs_retention_days = v;
        }
        if let Some(v) = overrides.completed_jobs_retention_days {
            self.completed_jobs_retention_days = v;
        }
        if let Some(v) = overrides.log_dir {
            self.log_dir = v;
        }
        if let Some(v) = overrides.log_level {
            self.log_level = v;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("MEDIAFORGE_WORK_ROOT") {
            self.work_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDIAFORGE_RESULTS_ROOT") {
            self.results_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDIAFORGE_INPUT_DIR") {
            self.input_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDIAFORGE_PROVIDERS_ROOT") {
            self.providers_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDIAFORGE_TEMPLATES_ROOT") {
            self.templates_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDIAFORGE_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("MEDIAFORGE_DEFAULT_COMPRESSION_MODE") {
            self.default_compression_mode = v.parse()?;
        }
        if let Ok(v) = std::env::var("MEDIAFORGE_DEFAULT_SHELVE_MODE") {
            self.default_shelve_mode = v.parse()?;
        }
        Ok(())
    }

    /// Validate the merged result before any job directory is created: the
    /// providers/templates roots must exist so provider/template names can
    /// be checked, per the expansion in §3.
    pub fn validate(&self) -> Result<()> {
        if !self.providers_root.is_dir() {
            return Err(Error::config(format!("providers root {} does not exist", self.providers_root.display())));
        }
        if !self.templates_root.is_dir() {
            return Err(Error::config(format!("templates root {} does not exist", self.templates_root.display())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_overrides_take_precedence_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("resources/providers")).await.unwrap();
        tokio::fs::create_dir_all(dir.path().join("resources/templates")).await.unwrap();
        let config_path = dir.path().join("config.toml");
        tokio::fs::write(&config_path, "log_level = \"debug\"\nfailed_jobs_retention_days = 3\n").await.unwrap();

        let config = ProcessConfig::load(&config_path).await.unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.failed_jobs_retention_days, 3);
        assert_eq!(config.results_root, PathBuf::from("./results"));
    }

    #[tokio::test]
    async fn missing_config_file_falls_back_to_defaults() {
        let config = ProcessConfig::load(Path::new("/nonexistent/config.toml")).await.unwrap();
        assert_eq!(config.log_level, "info");
    }
}
