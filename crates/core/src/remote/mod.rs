//! Remote object store boundary.
//!
//! A remote snapshot is one blob addressed as `scheme://bucket/path`. The
//! transport behind it is opaque to the session: it only needs to download a
//! blob and to upload a local file. Failures are reported as
//! `Error::RemoteSync` and never retried here.

pub mod fs;
pub mod http;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::Error;
use crate::config::RemoteConfig;

pub use fs::FsObjectStore;
pub use http::{HttpObjectStore, HttpStoreConfig};

/// Blob transport used by remote-synced sessions.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Fetch the whole blob at `bucket`/`key`.
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, Error>;

    /// Store the full contents of `source` as the blob at `bucket`/`key`.
    async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<(), Error>;
}

/// A resolved remote location split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub bucket: String,
    /// Object key, without the leading slash.
    pub key: String,
}

impl RemoteLocation {
    /// Split `uri` into bucket and key, accepting only `scheme`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLocation` if the scheme differs, or if the bucket
    /// or path component is empty.
    pub fn parse(uri: &str, scheme: &str) -> Result<Self, Error> {
        let (found, rest) = uri
            .trim()
            .split_once("://")
            .ok_or_else(|| Error::InvalidLocation(format!("{uri}: expected {scheme}://bucket/path")))?;

        if found != scheme {
            return Err(Error::InvalidLocation(format!("{uri}: scheme is not {scheme}: {found}")));
        }

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        let key = key.trim_start_matches('/');

        if bucket.is_empty() || key.is_empty() {
            return Err(Error::InvalidLocation(format!("{uri}: bucket and path must not be empty")));
        }

        Ok(Self { bucket: bucket.to_string(), key: key.to_string() })
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Build the transport described by the remote configuration.
///
/// An HTTP endpoint wins over a filesystem root when both are set.
pub fn client_from_config(config: &RemoteConfig) -> Result<Arc<dyn ObjectStore>, Error> {
    if let Some(endpoint) = &config.endpoint {
        let http = HttpObjectStore::new(HttpStoreConfig {
            endpoint: endpoint.clone(),
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
        })?;
        return Ok(Arc::new(http));
    }

    if let Some(root) = &config.root {
        return Ok(Arc::new(FsObjectStore::new(root)));
    }

    Err(Error::Configuration("remote storage needs remote.endpoint or remote.root".into()))
}
