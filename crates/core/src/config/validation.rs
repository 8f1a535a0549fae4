//! Configuration validation rules.
//!
//! This module provides validation logic for `HubConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::HubConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl HubConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `base_url` is not an absolute http(s) URL
    /// - `max_bytes` is 0 or exceeds 200MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_age_ms` is not positive
    /// - `user_agent` or `app_version` is empty
    /// - an extension list entry does not start with '.'
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "base_url".into(),
                reason: "must be an absolute http(s) URL".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 200 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 200MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_age_ms <= 0 {
            return Err(ConfigError::Invalid { field: "max_age_ms".into(), reason: "must be positive".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.app_version.is_empty() {
            return Err(ConfigError::Invalid { field: "app_version".into(), reason: "must not be empty".into() });
        }

        for ext in self.document_extensions.iter().chain(self.asset_extensions.iter()) {
            if !ext.starts_with('.') {
                return Err(ConfigError::Invalid {
                    field: "document_extensions/asset_extensions".into(),
                    reason: format!("extension {ext:?} must start with '.'"),
                });
            }
        }

        Ok(())
    }
}
