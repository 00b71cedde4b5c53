//! Crawl-facing lifecycle hooks.
//!
//! `TimeMachine` sits between a crawling engine and a snapshot session. The
//! engine calls `on_session_start` before the first request and
//! `on_session_end` after the last one. For each request, `before_fetch`
//! may answer from the snapshot and `after_fetch` records the real response.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::Error;
use crate::cache::{CachedRecord, FingerprintPolicy};
use crate::config::TimeMachineConfig;
use crate::request::{FetchRequest, FetchResponse};
use crate::session::{SessionIdentity, SessionMode, SnapshotSession, session_from_config};

pub const STAT_HIT: &str = "timemachine/hit";
pub const STAT_MISS: &str = "timemachine/miss";
pub const STAT_STORE: &str = "timemachine/store";
pub const STAT_SKIP_REPLAYED: &str = "timemachine/skip_replayed";
pub const STAT_CORRUPT: &str = "timemachine/corrupt";

/// Sink for the time machine's counters.
pub trait StatsCollector: Send + Sync + fmt::Debug {
    fn inc(&self, key: &str);
}

/// In-process counters.
#[derive(Debug, Default)]
pub struct MemoryStats {
    counters: Mutex<BTreeMap<String, u64>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counters
            .lock()
            .map(|counters| counters.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.lock().map(|counters| counters.clone()).unwrap_or_default()
    }
}

impl StatsCollector for MemoryStats {
    fn inc(&self, key: &str) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(key.to_string()).or_insert(0) += 1;
        }
    }
}

#[derive(Debug)]
pub struct TimeMachine {
    session: Box<dyn SnapshotSession>,
    policy: FingerprintPolicy,
    fail_on_unknown_request: bool,
    stats: Arc<dyn StatsCollector>,
}

impl TimeMachine {
    /// Replay and record follow `session.mode()`.
    pub fn new(session: Box<dyn SnapshotSession>, policy: FingerprintPolicy, stats: Arc<dyn StatsCollector>) -> Self {
        Self { session, policy, fail_on_unknown_request: false, stats }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConfigured` when `enabled` is false, and
    /// `Error::Configuration` when the selected storage cannot be built.
    pub fn from_config(config: &TimeMachineConfig, stats: Arc<dyn StatsCollector>) -> Result<Self, Error> {
        if !config.enabled {
            return Err(Error::NotConfigured("time machine is disabled".into()));
        }

        let session = session_from_config(config)?;

        Ok(Self::new(session, config.fingerprint_policy(), stats)
            .fail_on_unknown_request(config.fail_on_unknown_request))
    }

    /// Raise `Error::UnknownRequest` on a replay miss instead of letting the
    /// request through.
    pub fn fail_on_unknown_request(mut self, strict: bool) -> Self {
        self.fail_on_unknown_request = strict;
        self
    }

    pub fn mode(&self) -> SessionMode {
        self.session.mode()
    }

    pub fn session(&self) -> &dyn SnapshotSession {
        self.session.as_ref()
    }

    pub async fn on_session_start(&mut self, identity: &SessionIdentity) -> Result<(), Error> {
        self.session.open(&identity.template_params()).await?;

        tracing::info!(
            session = %identity.name,
            location = ?self.session.location(),
            retrieve = self.mode().retrieve,
            record = self.mode().record,
            "time machine session started"
        );

        Ok(())
    }

    pub async fn on_session_end(&mut self, identity: &SessionIdentity) -> Result<(), Error> {
        let result = self.session.close().await;

        match &result {
            Ok(()) => tracing::info!(session = %identity.name, "time machine session ended"),
            Err(e) => tracing::warn!(session = %identity.name, error = %e, "time machine session ended with error"),
        }

        result
    }

    /// Answer `request` from the snapshot.
    ///
    /// `Ok(None)` lets the request through. Always `None` when not retrieving.
    ///
    /// # Errors
    ///
    /// `Error::Codec` for a corrupt record, `Error::UnknownRequest` for a miss
    /// in strict mode.
    pub async fn before_fetch(&self, request: &FetchRequest) -> Result<Option<FetchResponse>, Error> {
        if !self.mode().retrieve {
            return Ok(None);
        }

        let fingerprint = self.policy.fingerprint(request);

        match self.session.retrieve(&fingerprint).await {
            Ok(Some(record)) => {
                self.stats.inc(STAT_HIT);
                tracing::debug!(%fingerprint, url = %request.url, status = record.status, "snapshot hit");
                Ok(Some(FetchResponse::from(record)))
            }
            Ok(None) => {
                self.stats.inc(STAT_MISS);
                if self.fail_on_unknown_request {
                    return Err(Error::UnknownRequest(format!("{} {} ({fingerprint})", request.method, request.url)));
                }
                tracing::debug!(%fingerprint, url = %request.url, "snapshot miss");
                Ok(None)
            }
            Err(e @ Error::Codec(_)) => {
                self.stats.inc(STAT_CORRUPT);
                tracing::warn!(%fingerprint, url = %request.url, error = %e, "corrupt snapshot record");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Record `response` for `request`. No-op unless recording; responses
    /// that came from the snapshot are skipped.
    pub async fn after_fetch(&self, request: &FetchRequest, response: &FetchResponse) -> Result<(), Error> {
        if !self.mode().record {
            return Ok(());
        }

        if response.from_snapshot {
            self.stats.inc(STAT_SKIP_REPLAYED);
            return Ok(());
        }

        let fingerprint = self.policy.fingerprint(request);
        self.session.store(&fingerprint, &CachedRecord::from(response)).await?;
        self.stats.inc(STAT_STORE);

        tracing::debug!(%fingerprint, url = %request.url, status = response.status, "recorded response");

        Ok(())
    }
}
