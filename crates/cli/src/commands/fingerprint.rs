//! `fingerprint` subcommand.

use serde::Serialize;
use timemachine_core::{Error, FetchRequest, TimeMachineConfig};

#[derive(Debug, Clone)]
pub struct FingerprintParams {
    pub method: String,
    pub url: String,
    /// `Name: value` pairs.
    pub headers: Vec<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerprintOutput {
    pub fingerprint: String,
}

pub fn fingerprint_impl(config: &TimeMachineConfig, params: FingerprintParams) -> Result<FingerprintOutput, Error> {
    let mut request = FetchRequest::new(params.method, params.url);

    for header in &params.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| Error::Configuration(format!("header must be `Name: value`: {header:?}")))?;
        request = request.with_header(name.trim(), value.trim());
    }

    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let fingerprint = config.fingerprint_policy().fingerprint(&request);
    Ok(FingerprintOutput { fingerprint: fingerprint.as_str().to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(url: &str, headers: &[&str]) -> FingerprintParams {
        FingerprintParams {
            method: "GET".into(),
            url: url.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            body: None,
        }
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let output = fingerprint_impl(&TimeMachineConfig::default(), params("https://example.com/", &[])).unwrap();
        assert_eq!(output.fingerprint.len(), 64);
        assert!(output.fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_headers_follow_config() {
        let config = TimeMachineConfig { include_headers: vec!["Accept-Language".into()], ..Default::default() };
        let en = fingerprint_impl(&config, params("https://example.com/", &["Accept-Language: en"])).unwrap();
        let de = fingerprint_impl(&config, params("https://example.com/", &["accept-language: de"])).unwrap();
        assert_ne!(en.fingerprint, de.fingerprint);

        let default = TimeMachineConfig::default();
        let en = fingerprint_impl(&default, params("https://example.com/", &["Accept-Language: en"])).unwrap();
        let de = fingerprint_impl(&default, params("https://example.com/", &["Accept-Language: de"])).unwrap();
        assert_eq!(en.fingerprint, de.fingerprint);
    }

    #[test]
    fn test_malformed_header() {
        let result = fingerprint_impl(&TimeMachineConfig::default(), params("https://example.com/", &["no-colon"]));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
