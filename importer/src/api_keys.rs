// importer/src/api_keys.rs
//!
//! API keys for the AI providers
//!
//! Keys come from environment variables first and the OS keyring second. The
//! pipeline only sees the `CredentialSource` trait, so tests can supply keys
//! without touching either.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Service name for keyring entries written by the importer.
pub const KEYCHAIN_SERVICE_NAME: &str = "stackhub-import";

/// Providers that need an API key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyProvider {
    OpenAI,
    Google,
    Anthropic,
}

impl ApiKeyProvider {
    fn keychain_id(&self) -> &'static str {
        match self {
            ApiKeyProvider::OpenAI => "api_key_openai",
            ApiKeyProvider::Google => "api_key_google",
            ApiKeyProvider::Anthropic => "api_key_anthropic",
        }
    }

    /// Environment variables checked in order
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            ApiKeyProvider::OpenAI => &["OPENAI_API_KEY"],
            ApiKeyProvider::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ApiKeyProvider::Anthropic => &["ANTHROPIC_API_KEY"],
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ApiKeyProvider::OpenAI => "OpenAI (GPT)",
            ApiKeyProvider::Google => "Google (Gemini)",
            ApiKeyProvider::Anthropic => "Anthropic (Claude)",
        }
    }

    /// Parse the `provider` field of a catalog model (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(ApiKeyProvider::OpenAI),
            "google" | "gemini" => Some(ApiKeyProvider::Google),
            "anthropic" => Some(ApiKeyProvider::Anthropic),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            ApiKeyProvider::OpenAI,
            ApiKeyProvider::Google,
            ApiKeyProvider::Anthropic,
        ]
    }
}

/// Where provider API keys are read from
pub trait CredentialSource: Send + Sync {
    fn api_key(&self, provider: ApiKeyProvider) -> Option<String>;

    fn has_api_key(&self, provider: ApiKeyProvider) -> bool {
        self.api_key(provider).is_some()
    }
}

/// Environment variables, then the OS keyring
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCredentials;

impl CredentialSource for SystemCredentials {
    fn api_key(&self, provider: ApiKeyProvider) -> Option<String> {
        provider
            .env_vars()
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .or_else(|| load_api_key(provider).ok())
    }
}

/// Fixed keys, for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    keys: HashMap<ApiKeyProvider, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: ApiKeyProvider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn api_key(&self, provider: ApiKeyProvider) -> Option<String> {
        self.keys.get(&provider).cloned()
    }
}

fn keyring_entry(provider: ApiKeyProvider) -> keyring::Result<keyring::Entry> {
    keyring::Entry::new(KEYCHAIN_SERVICE_NAME, provider.keychain_id())
}

/// Store an API key for a provider in the OS keyring
pub fn store_api_key(provider: ApiKeyProvider, api_key: &str) -> Result<()> {
    keyring_entry(provider)
        .and_then(|entry| entry.set_password(api_key))
        .with_context(|| format!("Failed to store API key for {}", provider.display_name()))
}

/// Load an API key for a provider from the OS keyring
pub fn load_api_key(provider: ApiKeyProvider) -> Result<String> {
    keyring_entry(provider)
        .and_then(|entry| entry.get_password())
        .with_context(|| format!("Failed to load API key for {}", provider.display_name()))
}

pub fn delete_api_key(provider: ApiKeyProvider) -> Result<()> {
    keyring_entry(provider)
        .and_then(|entry| entry.delete_credential())
        .with_context(|| format!("Failed to delete API key for {}", provider.display_name()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyStatus {
    pub provider: ApiKeyProvider,
    pub display_name: String,
    pub is_configured: bool,
    pub env_var: String,
}

pub fn get_all_api_key_status(source: &dyn CredentialSource) -> Vec<ApiKeyStatus> {
    ApiKeyProvider::all()
        .into_iter()
        .map(|provider| ApiKeyStatus {
            display_name: provider.display_name().to_string(),
            is_configured: source.has_api_key(provider),
            env_var: provider.env_vars()[0].to_string(),
            provider,
        })
        .collect()
}
