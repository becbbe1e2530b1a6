//! Runtime provider discovery over `<providers_root>/<name>/defaults.yaml`
//! (§4.5), contrasted with the compile-time, regex-keyed extractor factory
//! this is grounded on: here the catalog is built by scanning a directory,
//! not by registering structs in a macro table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use super::cloud_http::CloudHttpProvider;
use super::descriptor::{Capability, ProviderDescriptor, ProviderType};
use super::local_cli::LocalCliProvider;
use super::refinement::RefinementProvider;
use super::transcription::TranscriptionProvider;
use crate::{Error, Result};

pub struct ProviderRegistry {
    root: PathBuf,
    descriptors: HashMap<String, ProviderDescriptor>,
    transcription_cache: DashMap<String, Arc<dyn TranscriptionProvider>>,
    refinement_cache: DashMap<String, Arc<dyn RefinementProvider>>,
}

impl ProviderRegistry {
    /// Scan `root` for one `defaults.yaml` per immediate child directory and
    /// build the descriptor catalog. Malformed descriptors are skipped with a
    /// warning rather than failing discovery outright, so one broken provider
    /// directory cannot take every other provider down with it.
    pub async fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut descriptors = HashMap::new();
        let mut entries = tokio::fs::read_dir(&root)
            .await
            .map_err(|e| Error::io_path("reading providers root", &root, e))?;
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| Error::io_path("reading providers root", &root, e))?
        {
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let descriptor_path = entry.path().join("defaults.yaml");
            let raw = match tokio::fs::read_to_string(&descriptor_path).await {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            match serde_yaml::from_str::<ProviderDescriptor>(&raw) {
                Ok(descriptor) => {
                    descriptors.insert(descriptor.name.clone(), descriptor);
                }
                Err(err) => {
                    tracing::warn!(path = %descriptor_path.display(), error = %err, "skipping malformed provider descriptor");
                }
            }
        }
        Ok(Self { root, descriptors, transcription_cache: DashMap::new(), refinement_cache: DashMap::new() })
    }

    pub fn descriptor(&self, name: &str) -> Result<&ProviderDescriptor> {
        self.descriptors.get(name).ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    pub fn capable(&self, capability: Capability) -> Vec<&str> {
        self.descriptors
            .values()
            .filter(|d| d.has_capability(capability))
            .map(|d| d.name.as_str())
            .collect()
    }

    fn resolve_api_key(&self, descriptor: &ProviderDescriptor) -> Result<Option<String>> {
        match &descriptor.api_key_requirement {
            None => Ok(None),
            Some(env_var) => std::env::var(env_var).map(Some).map_err(|_| Error::MissingApiKey {
                provider: descriptor.name.clone(),
                env_var: env_var.clone(),
            }),
        }
    }

    fn build_local(&self, descriptor: &ProviderDescriptor) -> LocalCliProvider {
        let binary = self.root.join(&descriptor.name).join("bin");
        LocalCliProvider::new(binary.to_string_lossy().into_owned())
    }

    fn build_cloud(&self, descriptor: &ProviderDescriptor, model: &str) -> Result<CloudHttpProvider> {
        let api_key = self
            .resolve_api_key(descriptor)?
            .ok_or_else(|| Error::MissingApiKey { provider: descriptor.name.clone(), env_var: "unset".to_string() })?;
        let base_url = std::env::var(format!("{}_BASE_URL", descriptor.name.to_uppercase()))
            .unwrap_or_else(|_| format!("https://api.{}.example", descriptor.name));
        CloudHttpProvider::new(base_url, api_key, model)
    }

    pub fn get_transcription(&self, name: &str, model: &str) -> Result<Arc<dyn TranscriptionProvider>> {
        if let Some(cached) = self.transcription_cache.get(name) {
            return Ok(cached.clone());
        }
        let descriptor = self.descriptor(name)?;
        if !descriptor.has_capability(Capability::Transcription) {
            return Err(Error::Configuration(format!("provider '{name}' does not support transcription")));
        }
        let provider: Arc<dyn TranscriptionProvider> = match descriptor.provider_type {
            ProviderType::Local => Arc::new(self.build_local(descriptor)),
            ProviderType::Cloud | ProviderType::Hybrid => Arc::new(self.build_cloud(descriptor, model)?),
        };
        self.transcription_cache.insert(name.to_string(), provider.clone());
        Ok(provider)
    }

    pub fn get_refinement(&self, name: &str, model: &str) -> Result<Arc<dyn RefinementProvider>> {
        if let Some(cached) = self.refinement_cache.get(name) {
            return Ok(cached.clone());
        }
        let descriptor = self.descriptor(name)?;
        if !descriptor.has_capability(Capability::Refinement) {
            return Err(Error::Configuration(format!("provider '{name}' does not support refinement")));
        }
        let provider: Arc<dyn RefinementProvider> = match descriptor.provider_type {
            ProviderType::Local => Arc::new(self.build_local(descriptor)),
            ProviderType::Cloud | ProviderType::Hybrid => Arc::new(self.build_cloud(descriptor, model)?),
        };
        self.refinement_cache.insert(name.to_string(), provider.clone());
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_descriptor(dir: &Path, name: &str, yaml: &str) {
        let provider_dir = dir.join(name);
        tokio::fs::create_dir_all(&provider_dir).await.unwrap();
        tokio::fs::write(provider_dir.join("defaults.yaml"), yaml).await.unwrap();
    }

    #[tokio::test]
    async fn discovers_providers_and_skips_malformed_ones() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "local",
            "name: local\ndisplay_name: Local\ntype: local\ncapabilities: [transcription]\napi_key_requirement: null\nmodels: [base]\n",
        )
        .await;
        write_descriptor(dir.path(), "broken", "not: valid: yaml: [").await;

        let registry = ProviderRegistry::discover(dir.path()).await.unwrap();
        assert!(registry.descriptor("local").is_ok());
        assert!(registry.descriptor("broken").is_err());
    }

    #[tokio::test]
    async fn unknown_provider_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProviderRegistry::discover(dir.path()).await.unwrap();
        let err = registry.descriptor("nonexistent").unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(_)));
    }
}
