// importer/src/model_catalog.rs
//!
//! Model Catalog: the AI models the PDF importer may call
//!
//! Loads `config/model_catalog.toml`, which lists every model with its provider,
//! provider-side API name and token limits. A SHA-256 of the loaded file is kept
//! so each batch records exactly which catalog it was extracted under. If the
//! file is missing the built-in fallback catalog is used instead.
//!
//! The catalog is a plain value passed into the pipeline; there is no global.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::find_config_file;

pub const CATALOG_FILE_NAME: &str = "model_catalog.toml";

/// Model definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub id: String,
    pub provider: String,
    pub display_name: String,

    /// Name sent to the provider when it differs from `id`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(default = "default_true")]
    pub requires_api_key: bool,
}

impl ModelDef {
    pub fn api_name(&self) -> &str {
        self.api_name.as_deref().unwrap_or(&self.id)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub version: String,
    pub created_at: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDefaults {
    /// Model used when AI extraction is requested without naming one
    pub default_model: String,
}

/// Provider metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawModelCatalog {
    pub metadata: CatalogMetadata,
    pub defaults: CatalogDefaults,
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderInfo>,
}

/// Loaded model catalog with its content hash
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pub raw: RawModelCatalog,
    pub catalog_sha256: String,
    models_by_id: HashMap<String, ModelDef>,
}

impl ModelCatalog {
    /// Load catalog from the first `config/model_catalog.toml` found
    pub fn load_default() -> Result<Self> {
        let path = find_config_file(CATALOG_FILE_NAME)
            .ok_or_else(|| anyhow!("Could not find {CATALOG_FILE_NAME} in any config directory"))?;
        Self::load_from_path(&path)
    }

    /// Like `load_default`, but falls back to the built-in catalog on any failure
    pub fn load_default_or_fallback() -> Self {
        Self::load_default().unwrap_or_else(|err| {
            warn!("failed to load model catalog: {err:#}; using built-in catalog");
            Self::fallback_catalog()
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog from {:?}", path))?;

        let catalog = Self::load_from_str(&toml_str)?;
        info!(
            path = %path.display(),
            version = catalog.version(),
            models = catalog.raw.models.len(),
            "model catalog loaded"
        );
        Ok(catalog)
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let raw: RawModelCatalog =
            toml::from_str(toml_str).context("Failed to parse model catalog TOML")?;

        let catalog_sha256 = Self::compute_catalog_hash(toml_str);
        Self::from_raw(raw, catalog_sha256)
    }

    fn from_raw(raw: RawModelCatalog, catalog_sha256: String) -> Result<Self> {
        let mut models_by_id = HashMap::new();
        for model in &raw.models {
            if models_by_id.insert(model.id.clone(), model.clone()).is_some() {
                return Err(anyhow!("Duplicate model id '{}' in catalog", model.id));
            }
        }

        if !models_by_id.contains_key(&raw.defaults.default_model) {
            return Err(anyhow!(
                "Default model '{}' is not listed in the catalog",
                raw.defaults.default_model
            ));
        }

        Ok(ModelCatalog {
            raw,
            catalog_sha256,
            models_by_id,
        })
    }

    fn compute_catalog_hash(toml_str: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(toml_str.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get_model(&self, model_id: &str) -> Option<&ModelDef> {
        self.models_by_id.get(model_id)
    }

    /// Enabled model with this id, if any
    pub fn get_enabled_model(&self, model_id: &str) -> Option<&ModelDef> {
        self.get_model(model_id).filter(|m| m.enabled)
    }

    pub fn get_enabled_models(&self) -> Vec<&ModelDef> {
        self.raw.models.iter().filter(|m| m.enabled).collect()
    }

    /// Comma-separated ids of enabled models, for error messages
    pub fn enabled_model_ids(&self) -> String {
        self.get_enabled_models()
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn get_models_by_provider(&self, provider: &str) -> Vec<&ModelDef> {
        self.raw
            .models
            .iter()
            .filter(|m| m.provider == provider)
            .collect()
    }

    pub fn default_model_id(&self) -> &str {
        &self.raw.defaults.default_model
    }

    pub fn get_provider(&self, provider_name: &str) -> Option<&ProviderInfo> {
        self.raw.providers.get(provider_name)
    }

    /// Base URL override for a provider, when the catalog sets one
    pub fn api_base_url(&self, provider_name: &str) -> Option<&str> {
        self.get_provider(provider_name)
            .and_then(|p| p.api_base_url.as_deref())
    }

    pub fn version(&self) -> &str {
        &self.raw.metadata.version
    }

    /// Get the catalog hash (for batch provenance)
    pub fn hash(&self) -> &str {
        &self.catalog_sha256
    }

    /// Built-in catalog used when no catalog file can be loaded
    pub fn fallback_catalog() -> Self {
        let model = |id: &str, provider: &str, display_name: &str, context_window: u32, max_output_tokens: u32| ModelDef {
            id: id.to_string(),
            provider: provider.to_string(),
            display_name: display_name.to_string(),
            api_name: None,
            description: String::new(),
            enabled: true,
            context_window: Some(context_window),
            max_output_tokens: Some(max_output_tokens),
            requires_api_key: true,
        };

        let raw = RawModelCatalog {
            metadata: CatalogMetadata {
                version: "0.0.0-fallback".to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
                description: "Built-in catalog".to_string(),
            },
            defaults: CatalogDefaults {
                default_model: "gemini-2.0-flash".to_string(),
            },
            models: vec![
                model("gemini-2.0-flash", "google", "Gemini 2.0 Flash", 1_048_576, 8_192),
                model("gpt-4o-mini", "openai", "GPT-4o mini", 128_000, 16_384),
                model("claude-3-5-sonnet", "anthropic", "Claude 3.5 Sonnet", 200_000, 8_192),
            ],
            providers: HashMap::new(),
        };

        let models_by_id = raw
            .models
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();

        ModelCatalog {
            catalog_sha256: "fallback-0000000000000000".to_string(),
            raw,
            models_by_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CATALOG: &str = r#"
[metadata]
version = "1.2.0"
created_at = "2025-01-01T00:00:00Z"
description = "Test catalog"

[defaults]
default_model = "fast-model"

[[models]]
id = "fast-model"
provider = "google"
display_name = "Fast"
api_name = "gemini-fast-001"
context_window = 4096
max_output_tokens = 1024

[[models]]
id = "retired-model"
provider = "openai"
display_name = "Retired"
enabled = false

[providers.google]
name = "Google"
api_base_url = "http://localhost:9999"
"#;

    #[test]
    fn test_fallback_catalog() {
        let catalog = ModelCatalog::fallback_catalog();
        assert_eq!(catalog.version(), "0.0.0-fallback");
        assert!(catalog.get_model(catalog.default_model_id()).is_some());
        assert_eq!(catalog.get_enabled_models().len(), 3);
    }

    #[test]
    fn test_load_from_str() {
        let catalog = ModelCatalog::load_from_str(TEST_CATALOG).unwrap();

        assert_eq!(catalog.version(), "1.2.0");
        assert_eq!(catalog.default_model_id(), "fast-model");
        assert_eq!(catalog.hash().len(), 64);

        let fast = catalog.get_model("fast-model").unwrap();
        assert_eq!(fast.api_name(), "gemini-fast-001");
        assert!(fast.requires_api_key);
        assert_eq!(catalog.api_base_url("google"), Some("http://localhost:9999"));
        assert_eq!(catalog.api_base_url("openai"), None);
    }

    #[test]
    fn disabled_models_are_not_offered() {
        let catalog = ModelCatalog::load_from_str(TEST_CATALOG).unwrap();

        assert!(catalog.get_model("retired-model").is_some());
        assert!(catalog.get_enabled_model("retired-model").is_none());
        assert_eq!(catalog.enabled_model_ids(), "fast-model");
        assert_eq!(catalog.get_models_by_provider("openai").len(), 1);
    }

    #[test]
    fn default_model_must_exist() {
        let toml = TEST_CATALOG.replace(
            "default_model = \"fast-model\"",
            "default_model = \"ghost\"",
        );
        let err = ModelCatalog::load_from_str(&toml).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn hash_changes_with_content() {
        let a = ModelCatalog::load_from_str(TEST_CATALOG).unwrap();
        let b = ModelCatalog::load_from_str(&format!("{TEST_CATALOG}\n# edited\n")).unwrap();
        assert_ne!(a.hash(), b.hash());
    }
}
