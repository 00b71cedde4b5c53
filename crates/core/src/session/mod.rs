//! Snapshot sessions.
//!
//! A session is one crawl run's exclusive use of a snapshot store:
//! Closed → Open → Closed. Both implementations share the record layout: each
//! fingerprint owns a `_data` entry with the encoded record and a `_time`
//! entry with the write time. The `_time` entry is written last and read
//! first, so a record whose write was cut short reads as a miss.

pub mod local;
pub mod remote;
pub mod template;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::Error;
use crate::cache::{CachedRecord, Fingerprint, LocalStore, codec};
use crate::config::{StorageKind, TimeMachineConfig};
use crate::remote::client_from_config;

pub use local::LocalSession;
pub use remote::RemoteSession;
pub use template::{LocationTemplate, TemplateParams};

/// Format of the `time` template parameter. Filesystem and URL safe.
const TIME_PARAM_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Which directions of the snapshot a crawl uses. The flags are independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMode {
    /// Replay responses from the snapshot.
    pub retrieve: bool,
    /// Write fetched responses into the snapshot.
    pub record: bool,
}

impl SessionMode {
    pub fn new(retrieve: bool, record: bool) -> Self {
        Self { retrieve, record }
    }

    /// The store is opened but neither consulted nor written.
    pub fn is_pass_through(&self) -> bool {
        !self.retrieve && !self.record
    }
}

/// Who is running the session; supplies the location template parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub params: TemplateParams,
}

impl SessionIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), started_at: Utc::now(), params: BTreeMap::new() }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Extra parameters plus the built-in `name` and `time`, which win on clashes.
    pub fn template_params(&self) -> TemplateParams {
        let mut params = self.params.clone();
        params.insert("name".into(), self.name.clone());
        params.insert("time".into(), self.started_at.format(TIME_PARAM_FORMAT).to_string());
        params
    }
}

/// One crawl run's handle on a snapshot.
///
/// Callers drive a session sequentially; implementations do no locking.
#[async_trait::async_trait]
pub trait SnapshotSession: Send + Sync + fmt::Debug {
    /// Resolve the location with `params` and prepare the backing store.
    ///
    /// On failure nothing stays acquired, and `close` remains safe to call.
    async fn open(&mut self, params: &TemplateParams) -> Result<(), Error>;

    /// Look up a recorded response. `Ok(None)` is a miss.
    async fn retrieve(&self, fingerprint: &Fingerprint) -> Result<Option<CachedRecord>, Error>;

    /// Record a response, replacing any earlier record for the fingerprint.
    async fn store(&self, fingerprint: &Fingerprint, record: &CachedRecord) -> Result<(), Error>;

    /// Release the backing store. Safe to call repeatedly and after a failed open.
    async fn close(&mut self) -> Result<(), Error>;

    /// Whether the crawl replays from and records into this snapshot.
    fn mode(&self) -> SessionMode;

    fn is_open(&self) -> bool;

    /// Resolved location of the current or last opened snapshot.
    fn location(&self) -> Option<&str>;
}

/// Build the session implementation selected by the configuration.
pub fn session_from_config(config: &TimeMachineConfig) -> Result<Box<dyn SnapshotSession>, Error> {
    let mode = SessionMode::new(config.retrieve, config.record);
    match config.storage {
        StorageKind::Local => Ok(Box::new(LocalSession::new(config.uri.as_str(), &config.data_dir).with_mode(mode))),
        StorageKind::Remote => {
            let client = client_from_config(&config.remote)?;
            Ok(Box::new(RemoteSession::new(config.remote.uri.as_str(), &config.remote.scheme, mode, client)))
        }
    }
}

/// Read the record for `fingerprint`, checking the timestamp entry first.
pub async fn read_record(store: &LocalStore, fingerprint: &Fingerprint) -> Result<Option<CachedRecord>, Error> {
    if !store.contains(fingerprint.time_key().as_bytes()).await? {
        return Ok(None);
    }

    let Some(blob) = store.get(fingerprint.data_key().as_bytes()).await? else {
        return Err(Error::Codec(format!("{fingerprint}: timestamp present but payload missing")));
    };

    codec::decode(&blob).map(Some)
}

/// Write payload then timestamp for `fingerprint`.
pub(crate) async fn write_record(
    store: &LocalStore, fingerprint: &Fingerprint, record: &CachedRecord,
) -> Result<(), Error> {
    let blob = codec::encode(record)?;
    store.put(fingerprint.data_key().as_bytes(), &blob).await?;
    store
        .put(fingerprint.time_key().as_bytes(), Utc::now().to_rfc3339().as_bytes())
        .await
}

/// When the record for `fingerprint` was written, if it exists.
pub async fn recorded_at(store: &LocalStore, fingerprint: &Fingerprint) -> Result<Option<DateTime<Utc>>, Error> {
    let Some(raw) = store.get(fingerprint.time_key().as_bytes()).await? else {
        return Ok(None);
    };

    let text = String::from_utf8_lossy(&raw);
    DateTime::parse_from_rfc3339(&text)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| Error::Codec(format!("{fingerprint}: bad timestamp {text:?}: {e}")))
}
