//! Request and response values exchanged with the crawling engine.
//!
//! The engine owns its own HTTP object model; these are the minimal shapes the
//! time machine needs to fingerprint a request and to snapshot or replay a
//! response.

pub mod url;

use std::collections::BTreeMap;

pub use self::url::{UrlError, canonicalize};

/// Response headers: name to values, in name order.
pub type Headers = BTreeMap<String, Vec<String>>;

/// An outbound request as seen by the fetch hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into(), url: url.into(), headers: Vec::new(), body: Vec::new() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// All values of a header, matched case-insensitively, in request order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response flowing through the fetch hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Set on responses replayed from a snapshot, so they are never recorded again.
    pub from_snapshot: bool,
}

impl FetchResponse {
    pub fn new(status: u16, url: impl Into<String>, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self { status, url: url.into(), headers, body: body.into(), from_snapshot: false }
    }
}
