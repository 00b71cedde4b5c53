//! Record codec: one self-describing blob per cached response.
//!
//! The blob is a MessagePack map with named fields. The body inside it is
//! gzip-compressed; everything else is stored as is.

use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::request::{FetchResponse, Headers};

/// Wire format version written by [`encode`].
pub const FORMAT_VERSION: u8 = 1;

/// A response as persisted in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    pub status: u16,
    pub url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireRecord {
    format: u8,
    status: u16,
    url: String,
    headers: Headers,
    #[serde(with = "serde_bytes")]
    body: Vec<u8>,
}

impl From<&FetchResponse> for CachedRecord {
    fn from(response: &FetchResponse) -> Self {
        Self {
            status: response.status,
            url: response.url.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
        }
    }
}

impl From<CachedRecord> for FetchResponse {
    fn from(record: CachedRecord) -> Self {
        Self { status: record.status, url: record.url, headers: record.headers, body: record.body, from_snapshot: true }
    }
}

/// Serialize a record, compressing its body.
pub fn encode(record: &CachedRecord) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&record.body)
        .map_err(|e| Error::Codec(format!("compress body: {e}")))?;
    let body = encoder
        .finish()
        .map_err(|e| Error::Codec(format!("compress body: {e}")))?;

    let wire = WireRecord {
        format: FORMAT_VERSION,
        status: record.status,
        url: record.url.clone(),
        headers: record.headers.clone(),
        body,
    };

    rmp_serde::to_vec_named(&wire).map_err(|e| Error::Codec(format!("serialize record: {e}")))
}

/// Deserialize a record produced by [`encode`], decompressing its body.
///
/// # Errors
///
/// Returns `Error::Codec` if the blob is truncated, was written by an unknown
/// format version, or its body is not valid gzip.
pub fn decode(bytes: &[u8]) -> Result<CachedRecord, Error> {
    let wire: WireRecord =
        rmp_serde::from_slice(bytes).map_err(|e| Error::Codec(format!("deserialize record: {e}")))?;

    if wire.format != FORMAT_VERSION {
        return Err(Error::Codec(format!("unsupported record format {}", wire.format)));
    }

    let mut body = Vec::new();
    GzDecoder::new(wire.body.as_slice())
        .read_to_end(&mut body)
        .map_err(|e| Error::Codec(format!("decompress body: {e}")))?;

    Ok(CachedRecord { status: wire.status, url: wire.url, headers: wire.headers, body })
}
