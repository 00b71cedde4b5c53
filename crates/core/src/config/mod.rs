//! Time machine configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TIME_MACHINE_*)
//! 2. TOML config file (if TIME_MACHINE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::FingerprintPolicy;

mod validation;

pub use validation::ConfigError;

/// Which session implementation backs the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Snapshot is a SQLite file on local disk.
    #[default]
    Local,
    /// Snapshot is staged locally and synced with an object store.
    Remote,
}

/// Time machine configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TIME_MACHINE_*)
/// 2. TOML config file (if TIME_MACHINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeMachineConfig {
    /// Master switch. A disabled time machine refuses to be constructed.
    ///
    /// Set via TIME_MACHINE_ENABLED environment variable.
    #[serde(default)]
    pub enabled: bool,

    /// Session implementation.
    ///
    /// Set via TIME_MACHINE_STORAGE environment variable ("local" or "remote").
    #[serde(default)]
    pub storage: StorageKind,

    /// Snapshot location template for local storage, e.g. `snapshots/{name}.db`.
    ///
    /// Set via TIME_MACHINE_URI environment variable.
    #[serde(default)]
    pub uri: String,

    /// Replay recorded responses instead of fetching.
    ///
    /// Set via TIME_MACHINE_RETRIEVE environment variable.
    #[serde(default)]
    pub retrieve: bool,

    /// Record fetched responses into the snapshot.
    ///
    /// Set via TIME_MACHINE_RECORD environment variable.
    #[serde(default)]
    pub record: bool,

    /// Abort the crawl when a replayed crawl asks for an unrecorded request.
    ///
    /// Set via TIME_MACHINE_FAIL_ON_UNKNOWN_REQUEST environment variable.
    #[serde(default)]
    pub fail_on_unknown_request: bool,

    /// Request headers that take part in the fingerprint.
    ///
    /// Set via TIME_MACHINE_INCLUDE_HEADERS environment variable, either as a
    /// comma-separated list (`Accept-Language,Cookie`) or as an array
    /// (`[Accept-Language, Cookie]`).
    #[serde(default, deserialize_with = "header_list")]
    pub include_headers: Vec<String>,

    /// Keep URL fragments when fingerprinting.
    #[serde(default)]
    pub keep_fragments: bool,

    /// Directory that anchors relative local snapshot paths.
    ///
    /// Set via TIME_MACHINE_DATA_DIR environment variable.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Remote object store settings, used when `storage = "remote"`.
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Remote object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote location template, e.g. `s3://bucket/crawls/{name}.db`.
    ///
    /// Set via TIME_MACHINE_REMOTE__URI environment variable.
    #[serde(default)]
    pub uri: String,

    /// The one URI scheme accepted for remote locations.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Base URL of an HTTP object store. Objects live at `{endpoint}/{bucket}/{path}`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Root directory of a filesystem object store, used instead of `endpoint`.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Opaque credential passed through to the transport.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Opaque credential passed through to the transport.
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderList {
    Joined(String),
    List(Vec<String>),
}

fn header_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let headers = match HeaderList::deserialize(deserializer)? {
        HeaderList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        HeaderList::List(list) => list,
    };
    Ok(headers
        .into_iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect())
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".timemachine")
}

fn default_scheme() -> String {
    "s3".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            scheme: default_scheme(),
            endpoint: None,
            root: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Default for TimeMachineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            storage: StorageKind::Local,
            uri: String::new(),
            retrieve: false,
            record: false,
            fail_on_unknown_request: false,
            include_headers: Vec::new(),
            keep_fragments: false,
            data_dir: default_data_dir(),
            remote: RemoteConfig::default(),
        }
    }
}

impl TimeMachineConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TIME_MACHINE_`
    /// 2. TOML file from `TIME_MACHINE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TIME_MACHINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TIME_MACHINE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    /// Extract and validate a configuration from an already assembled figment.
    pub fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Fingerprint policy described by this configuration.
    pub fn fingerprint_policy(&self) -> FingerprintPolicy {
        FingerprintPolicy::new(self.include_headers.iter().map(String::as_str)).keep_fragments(self.keep_fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TimeMachineConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.storage, StorageKind::Local);
        assert!(config.uri.is_empty());
        assert!(!config.retrieve);
        assert!(!config.record);
        assert!(!config.fail_on_unknown_request);
        assert_eq!(config.data_dir, PathBuf::from(".timemachine"));
        assert_eq!(config.remote.scheme, "s3");
        assert!(config.remote.endpoint.is_none());
    }

    #[test]
    fn test_extract_from_toml() {
        let figment = Figment::from(Serialized::defaults(TimeMachineConfig::default())).merge(Toml::string(
            r#"
            enabled = true
            storage = "remote"
            record = true
            include_headers = ["Accept-Language"]

            [remote]
            uri = "s3://crawls/{name}.db"
            root = "/var/lib/snapshots"
            "#,
        ));

        let config = TimeMachineConfig::extract(figment).unwrap();
        assert!(config.enabled);
        assert_eq!(config.storage, StorageKind::Remote);
        assert!(config.record);
        assert_eq!(config.remote.uri, "s3://crawls/{name}.db");
        assert_eq!(config.remote.root, Some(PathBuf::from("/var/lib/snapshots")));
        assert_eq!(config.remote.scheme, "s3");
        assert_eq!(config.include_headers, vec!["Accept-Language".to_string()]);
    }

    #[test]
    fn test_extract_rejects_unknown_storage() {
        let figment = Figment::from(Serialized::defaults(TimeMachineConfig::default()))
            .merge(Toml::string(r#"storage = "tape""#));
        let result = TimeMachineConfig::extract(figment);
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));
    }

    #[test]
    fn test_include_headers_from_joined_string() {
        let figment = Figment::from(Serialized::defaults(TimeMachineConfig::default()))
            .merge(Toml::string(r#"include_headers = "Accept-Language, Cookie,""#));
        let config = TimeMachineConfig::extract(figment).unwrap();
        assert_eq!(config.include_headers, vec!["Accept-Language".to_string(), "Cookie".to_string()]);
    }

    #[test]
    fn test_include_headers_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TIME_MACHINE_INCLUDE_HEADERS", "Accept-Language");
            let config = TimeMachineConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.include_headers, vec!["Accept-Language".to_string()]);

            jail.set_env("TIME_MACHINE_INCLUDE_HEADERS", "[Accept-Language, Cookie]");
            let config = TimeMachineConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.include_headers, vec!["Accept-Language".to_string(), "Cookie".to_string()]);

            jail.set_env("TIME_MACHINE_REMOTE__SCHEME", "gs");
            let config = TimeMachineConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.remote.scheme, "gs");
            Ok(())
        });
    }

    #[test]
    fn test_fingerprint_policy_uses_headers() {
        let config = TimeMachineConfig { include_headers: vec!["Accept".into()], ..Default::default() };
        let policy = config.fingerprint_policy();
        assert_eq!(policy.headers(), ["accept".to_string()]);
    }
}
