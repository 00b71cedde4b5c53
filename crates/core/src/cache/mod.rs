//! SQLite-backed snapshot storage for recorded responses.
//!
//! This module provides the pieces a snapshot session is built from:
//!
//! - Request fingerprints using SHA-256 hashing
//! - The record codec (MessagePack with a gzip-compressed body)
//! - A byte-keyed SQLite store with automatic schema migrations

pub mod codec;
pub mod fingerprint;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use codec::{CachedRecord, decode, encode};
pub use fingerprint::{Fingerprint, FingerprintPolicy};
pub use store::{LocalStore, OpenMode};
