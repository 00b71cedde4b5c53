//! Request fingerprints: the primary key namespace of a snapshot.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::request::{FetchRequest, canonicalize};

const DATA_SUFFIX: &str = "_data";
const TIME_SUFFIX: &str = "_time";

/// Opaque identity of a request.
///
/// Computed fingerprints are 64 lowercase hex characters. Any string can be
/// wrapped directly, which is how tools address an entry they already know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key holding the encoded record.
    pub fn data_key(&self) -> String {
        format!("{}{DATA_SUFFIX}", self.0)
    }

    /// Store key holding the write timestamp; its presence defines "recorded".
    pub fn time_key(&self) -> String {
        format!("{}{TIME_SUFFIX}", self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decides which parts of a request make up its identity.
///
/// Method, canonical URL and body always count. Headers count only when named
/// in the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintPolicy {
    headers: Vec<String>,
    keep_fragments: bool,
}

impl FingerprintPolicy {
    pub fn new<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        headers.sort();
        headers.dedup();
        Self { headers, keep_fragments: false }
    }

    pub fn keep_fragments(mut self, keep: bool) -> Self {
        self.keep_fragments = keep;
        self
    }

    /// Lowercased header names included in fingerprints, sorted.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Compute the fingerprint of a request. Never fails.
    pub fn fingerprint(&self, request: &FetchRequest) -> Fingerprint {
        let url = canonicalize(&request.url, self.keep_fragments)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| request.url.trim().to_string());

        let mut hasher = Sha256::new();
        hasher.update(request.method.trim().to_ascii_uppercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        for name in &self.headers {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            for value in request.header_values(name) {
                hasher.update(value.as_bytes());
                hasher.update(b",");
            }
            hasher.update(b"\n");
        }
        hasher.update((request.body.len() as u64).to_le_bytes());
        hasher.update(&request.body);

        Fingerprint(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_stability() {
        let policy = FingerprintPolicy::default();
        let request = FetchRequest::get("https://example.com/page?b=2&a=1").with_body(b"payload".to_vec());
        assert_eq!(policy.fingerprint(&request), policy.fingerprint(&request.clone()));
    }

    #[test]
    fn test_fingerprint_known_digests() {
        let policy = FingerprintPolicy::new(["Accept-Language"]);
        let request = FetchRequest::new("post", "https://Example.com/search?q=rust&a=1")
            .with_header("Accept-Language", "en")
            .with_body(br#"{"q":"rust"}"#.to_vec());
        assert_eq!(
            policy.fingerprint(&request).as_str(),
            "79734ceab343a07a719283a44fa9d34d7dec9932623bbb0ba24688e1c29c3387"
        );

        let plain = FingerprintPolicy::default().fingerprint(&FetchRequest::get("https://example.com"));
        assert_eq!(plain.as_str(), "afa0b371521e5e4433a2773b0dd1e2441f426066b89c0ebf6da3746c12f65ab0");
    }

    #[test]
    fn test_fingerprint_equivalent_spellings() {
        let fp = FingerprintPolicy::default().fingerprint(&FetchRequest::get("https://example.com"));
        let again = FingerprintPolicy::default().fingerprint(&FetchRequest::get("  https://EXAMPLE.com/#top "));
        assert_eq!(fp, again);
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = FingerprintPolicy::default().fingerprint(&FetchRequest::get("https://example.com"));
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_query_order_ignored() {
        let policy = FingerprintPolicy::default();
        let a = policy.fingerprint(&FetchRequest::get("https://example.com/?a=1&b=2"));
        let b = policy.fingerprint(&FetchRequest::get("https://example.com/?b=2&a=1"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_different_method() {
        let policy = FingerprintPolicy::default();
        let get = policy.fingerprint(&FetchRequest::get("https://example.com"));
        let post = policy.fingerprint(&FetchRequest::new("post", "https://example.com"));
        assert_ne!(get, post);
    }

    #[test]
    fn test_fingerprint_different_body() {
        let policy = FingerprintPolicy::default();
        let a = policy.fingerprint(&FetchRequest::new("POST", "https://example.com").with_body(b"a=1".to_vec()));
        let b = policy.fingerprint(&FetchRequest::new("POST", "https://example.com").with_body(b"a=2".to_vec()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_headers_ignored_by_default() {
        let policy = FingerprintPolicy::default();
        let a = policy.fingerprint(&FetchRequest::get("https://example.com").with_header("Accept-Language", "en"));
        let b = policy.fingerprint(&FetchRequest::get("https://example.com").with_header("Accept-Language", "de"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_included_header() {
        let policy = FingerprintPolicy::new(["Accept-Language"]);
        let a = policy.fingerprint(&FetchRequest::get("https://example.com").with_header("accept-language", "en"));
        let b = policy.fingerprint(&FetchRequest::get("https://example.com").with_header("Accept-Language", "de"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_unparseable_url() {
        let policy = FingerprintPolicy::default();
        let a = policy.fingerprint(&FetchRequest::get("http://[::1"));
        let b = policy.fingerprint(&FetchRequest::get(" http://[::1 "));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sub_keys() {
        let fp = Fingerprint::from("abc");
        assert_eq!(fp.data_key(), "abc_data");
        assert_eq!(fp.time_key(), "abc_time");
        assert_eq!(fp.to_string(), "abc");
    }
}
