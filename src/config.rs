//! Client configuration
//!
//! Loaded from `ARCHIFLOW_*` environment variables. Values that are missing or
//! fail to parse keep their defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_KEYRING_SERVICE: &str = "com.archiflow.client";

/// Where the token pair is persisted between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// OS credential store (Keychain, Secret Service)
    Keyring,
    /// JSON file on disk
    File(PathBuf),
    /// Process memory only, nothing survives a restart
    Memory,
}

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, including the version prefix
    pub base_url: String,
    /// Default timeout applied to each request
    pub request_timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Token persistence backend
    pub token_store: TokenStoreKind,
    /// Service name used for keyring entries
    pub keyring_service: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(40),
            connect_timeout: Duration::from_secs(10),
            token_store: TokenStoreKind::Keyring,
            keyring_service: DEFAULT_KEYRING_SERVICE.to_string(),
        }
    }
}

fn default_token_file() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".archiflow").join("tokens.json")
}

fn non_empty_var(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn secs_var(key: &str) -> Option<Duration> {
    non_empty_var(key)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

impl ClientConfig {
    /// Create a config pointing at `base_url` with all other values defaulted
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = non_empty_var("ARCHIFLOW_API_URL") {
            config.base_url = url;
        }
        if let Some(timeout) = secs_var("ARCHIFLOW_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = timeout;
        }
        if let Some(timeout) = secs_var("ARCHIFLOW_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = timeout;
        }
        if let Some(service) = non_empty_var("ARCHIFLOW_KEYRING_SERVICE") {
            config.keyring_service = service;
        }

        let token_file = non_empty_var("ARCHIFLOW_TOKEN_FILE").map(PathBuf::from);
        config.token_store = match non_empty_var("ARCHIFLOW_TOKEN_STORE")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            Some("memory") => TokenStoreKind::Memory,
            Some("file") => TokenStoreKind::File(token_file.unwrap_or_else(default_token_file)),
            // An explicit file path implies the file store.
            None if token_file.is_some() => {
                TokenStoreKind::File(token_file.unwrap_or_else(default_token_file))
            }
            _ => TokenStoreKind::Keyring,
        };

        config
    }

    /// Join an API path onto the base URL
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}
