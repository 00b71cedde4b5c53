//! Subcommand implementations.

pub mod fingerprint;
pub mod get;
pub mod sync;

pub use fingerprint::FingerprintParams;
pub use get::GetParams;
