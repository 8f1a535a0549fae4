//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DOCHUB_*)
//! 2. TOML config file (if DOCHUB_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Hub configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DOCHUB_*)
/// 2. TOML config file (if DOCHUB_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Origin the hub serves; relative catalog and shell URLs resolve
    /// against this.
    ///
    /// Set via DOCHUB_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Catalog manifest location, relative to base_url.
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,

    /// Application entry page, relative to base_url. The navigation
    /// offline fallback and the one resource a document request must
    /// never be answered with.
    #[serde(default = "default_entry_url")]
    pub entry_url: String,

    /// Fixed shell resources prefetched alongside the catalog items.
    #[serde(default = "default_shell_urls")]
    pub shell_urls: Vec<String>,

    /// Extensions classified as large binary documents.
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,

    /// Extensions classified as static shell assets.
    #[serde(default = "default_asset_extensions")]
    pub asset_extensions: Vec<String>,

    /// Build version tag for the shell store; bumping it purges the
    /// previous build's shell rows on activation.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Path to the SQLite cache database.
    ///
    /// Set via DOCHUB_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Age past which the offline set counts as stale, in milliseconds.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: i64,
}

fn default_base_url() -> String {
    "http://localhost:8000/".into()
}

fn default_manifest_url() -> String {
    "docs/manifest.json".into()
}

fn default_entry_url() -> String {
    "index.html".into()
}

fn default_shell_urls() -> Vec<String> {
    vec![
        "index.html".into(),
        "app.js".into(),
        "styles.css".into(),
        "app.webmanifest".into(),
    ]
}

fn default_document_extensions() -> Vec<String> {
    vec![".pdf".into()]
}

fn default_asset_extensions() -> Vec<String> {
    vec![
        ".js".into(),
        ".css".into(),
        ".html".into(),
        ".webmanifest".into(),
        ".png".into(),
        ".jpg".into(),
        ".jpeg".into(),
        ".svg".into(),
        ".ico".into(),
    ]
}

fn default_app_version() -> String {
    "dev".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./dochub-cache.sqlite")
}

fn default_user_agent() -> String {
    "dochub/0.1".into()
}

fn default_max_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_age_ms() -> i64 {
    24 * 60 * 60 * 1000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            manifest_url: default_manifest_url(),
            entry_url: default_entry_url(),
            shell_urls: default_shell_urls(),
            document_extensions: default_document_extensions(),
            asset_extensions: default_asset_extensions(),
            app_version: default_app_version(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_age_ms: default_max_age_ms(),
        }
    }
}

impl HubConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DOCHUB_`
    /// 2. TOML file from `DOCHUB_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation
    /// fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DOCHUB_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DOCHUB_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
