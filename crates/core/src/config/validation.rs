//! Configuration validation rules.
//!
//! This module provides validation logic for `TimeMachineConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{StorageKind, TimeMachineConfig};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl TimeMachineConfig {
    /// Validate configuration values after loading.
    ///
    /// A disabled configuration is always valid; nothing will read it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - local storage has no `uri`
    /// - remote storage has no `remote.uri`, or neither `remote.endpoint` nor `remote.root`
    /// - `remote.scheme` is empty
    /// - `remote.endpoint` is not an http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }

        match self.storage {
            StorageKind::Local => {
                if self.uri.trim().is_empty() {
                    return Err(ConfigError::Missing {
                        field: "uri".into(),
                        hint: "Set TIME_MACHINE_URI environment variable".into(),
                    });
                }
            }
            StorageKind::Remote => self.validate_remote()?,
        }

        if !self.retrieve && !self.record {
            tracing::warn!("Neither retrieve nor record is enabled; the snapshot will be opened but never used");
        }

        Ok(())
    }

    fn validate_remote(&self) -> Result<(), ConfigError> {
        let remote = &self.remote;

        if remote.uri.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "remote.uri".into(),
                hint: "Set TIME_MACHINE_REMOTE__URI environment variable".into(),
            });
        }

        if remote.scheme.is_empty() {
            return Err(ConfigError::Invalid { field: "remote.scheme".into(), reason: "must not be empty".into() });
        }

        match (&remote.endpoint, &remote.root) {
            (None, None) => {
                return Err(ConfigError::Missing {
                    field: "remote.endpoint".into(),
                    hint: "Set TIME_MACHINE_REMOTE__ENDPOINT or TIME_MACHINE_REMOTE__ROOT".into(),
                });
            }
            (Some(endpoint), _) => {
                let parsed = url::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
                    field: "remote.endpoint".into(),
                    reason: e.to_string(),
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid {
                        field: "remote.endpoint".into(),
                        reason: format!("unsupported scheme: {}", parsed.scheme()),
                    });
                }
                if remote.root.is_some() {
                    tracing::warn!("Both remote.endpoint and remote.root are set; endpoint takes precedence");
                }
            }
            (None, Some(_)) => {}
        }

        Ok(())
    }
}
