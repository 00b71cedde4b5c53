//! Response snapshot cache for crawlers.
//!
//! This crate provides:
//! - Request fingerprints and the record codec
//! - A SQLite-backed local store
//! - Snapshot sessions over local files or remote object stores
//! - The `TimeMachine` lifecycle hooks and their configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod remote;
pub mod request;
pub mod session;
pub mod timemachine;

pub use cache::{CachedRecord, Fingerprint, FingerprintPolicy, LocalStore, OpenMode};
pub use config::{StorageKind, TimeMachineConfig};
pub use error::Error;
pub use request::{FetchRequest, FetchResponse, Headers};
pub use session::{LocalSession, RemoteSession, SessionIdentity, SessionMode, SnapshotSession};
pub use timemachine::{MemoryStats, StatsCollector, TimeMachine};
