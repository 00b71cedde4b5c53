//! `get` subcommand.
//!
//! Reads one record straight from a snapshot store file.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use timemachine_core::session::{read_record, recorded_at};
use timemachine_core::{CachedRecord, Error, Fingerprint, Headers, LocalStore, OpenMode};

#[derive(Debug, Clone)]
pub struct GetParams {
    pub db: PathBuf,
    pub fingerprint: String,
    pub body_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetOutput {
    pub fingerprint: String,
    pub status: u16,
    pub url: String,
    pub headers: Headers,
    pub body_bytes: usize,
    pub recorded_at: Option<DateTime<Utc>>,
}

pub async fn get_impl(params: GetParams) -> Result<GetOutput, Error> {
    let fingerprint = Fingerprint::from(params.fingerprint.trim());
    let mut store = LocalStore::open(&params.db, OpenMode::OpenExisting).await?;

    let found = lookup(&store, &fingerprint).await;
    store.close().await?;
    let (record, recorded_at) = found?;

    let record = record.ok_or_else(|| Error::UnknownRequest(format!("no record for {fingerprint}")))?;

    if let Some(path) = &params.body_out {
        tokio::fs::write(path, &record.body).await?;
    }

    Ok(GetOutput {
        fingerprint: fingerprint.to_string(),
        status: record.status,
        url: record.url,
        headers: record.headers,
        body_bytes: record.body.len(),
        recorded_at,
    })
}

async fn lookup(
    store: &LocalStore, fingerprint: &Fingerprint,
) -> Result<(Option<CachedRecord>, Option<DateTime<Utc>>), Error> {
    let record = read_record(store, fingerprint).await?;
    let at = recorded_at(store, fingerprint).await?;
    Ok((record, at))
}
