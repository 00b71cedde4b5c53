//! HTTP object store client.
//!
//! Speaks plain GET/PUT against `{endpoint}/{bucket}/{key}` with every path
//! segment percent-encoded. That covers S3-compatible gateways with path-style
//! addressing and most blob proxies.
//!
//! ### Behaviour
//!
//! - **Authentication**: basic auth from the configured credentials, passed
//!   through untouched. No credentials means anonymous requests.
//! - **Timeouts**: none. Callers wrapping a session impose their own deadline.
//! - **Retries**: none. Any non-2xx status or transport error is a
//!   `RemoteSyncError`.

use std::path::Path;

use bytes::Bytes;

use super::ObjectStore;
use crate::Error;

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "timemachine/0.1";

/// HTTP object store configuration.
#[derive(Debug, Clone, Default)]
pub struct HttpStoreConfig {
    /// Base URL, e.g. `https://objects.example.com`.
    pub endpoint: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// HTTP object store client.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    http: reqwest::Client,
    base: url::Url,
    config: HttpStoreConfig,
}

impl HttpObjectStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, Error> {
        if config.endpoint.trim().is_empty() {
            return Err(Error::Configuration("remote.endpoint must not be empty".into()));
        }

        let base = url::Url::parse(config.endpoint.trim())
            .map_err(|e| Error::Configuration(format!("remote.endpoint is not a URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::Configuration(format!("remote.endpoint cannot hold object paths: {base}")));
        }

        let http = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base, config })
    }

    /// `bucket` and each `/`-separated part of `key` become one percent-encoded
    /// path segment, so `?` and `#` stay part of the object name.
    fn object_url(&self, bucket: &str, key: &str) -> Result<url::Url, Error> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Configuration(format!("remote.endpoint cannot hold object paths: {}", self.base)))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_key_id {
            Some(id) => request.basic_auth(id, self.config.secret_access_key.as_deref()),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for HttpObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, Error> {
        let url = self.object_url(bucket, key)?;

        let response = self
            .authorize(self.http.get(url.clone()))
            .send()
            .await
            .map_err(|e| Error::RemoteSync(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteSync(format!("GET {url}: status {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::RemoteSync(format!("GET {url}: failed to read body: {e}")))?;

        tracing::debug!(%url, bytes = bytes.len(), "downloaded snapshot blob");

        Ok(bytes)
    }

    async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<(), Error> {
        let url = self.object_url(bucket, key)?;

        let body = tokio::fs::read(source)
            .await
            .map_err(|e| Error::RemoteSync(format!("PUT {url}: cannot read {}: {e}", source.display())))?;
        let size = body.len();

        let response = self
            .authorize(self.http.put(url.clone()))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::RemoteSync(format!("PUT {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteSync(format!("PUT {url}: status {}", status.as_u16())));
        }

        tracing::debug!(%url, bytes = size, "uploaded snapshot blob");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpObjectStore {
        HttpObjectStore::new(HttpStoreConfig {
            endpoint: format!("{}/", server.uri()),
            access_key_id: Some("key-id".into()),
            secret_access_key: Some("secret".into()),
        })
        .unwrap()
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = HttpObjectStore::new(HttpStoreConfig::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_download_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket1/path/snap.db"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"sqlite bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let data = client(&server).download("bucket1", "path/snap.db").await.unwrap();
        assert_eq!(&data[..], b"sqlite bytes");
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server).download("bucket1", "missing.db").await;
        assert!(matches!(result, Err(Error::RemoteSync(msg)) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_upload_sends_file_contents() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket1/path/snap.db"))
            .and(header("content-type", "application/octet-stream"))
            .and(body_bytes(b"local file".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("snap.db");
        std::fs::write(&source, b"local file").unwrap();

        client(&server).upload(&source, "bucket1", "path/snap.db").await.unwrap();
    }

    #[test]
    fn test_endpoint_must_be_url() {
        let result = HttpObjectStore::new(HttpStoreConfig { endpoint: "objects.local".into(), ..Default::default() });
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_reserved_characters_stay_in_key() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket1/crawls/a%3Fx.db"))
            .and(body_bytes(b"first".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bucket1/crawls/a%23y.db"))
            .and(body_bytes(b"second".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.db");
        let second = dir.path().join("second.db");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();

        let client = client(&server);
        client.upload(&first, "bucket1", "crawls/a?x.db").await.unwrap();
        client.upload(&second, "bucket1", "crawls/a#y.db").await.unwrap();
    }

    #[tokio::test]
    async fn test_endpoint_prefix_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/store/bucket1/snap.db"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"prefixed".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpObjectStore::new(HttpStoreConfig {
            endpoint: format!("{}/store/", server.uri()),
            ..Default::default()
        })
        .unwrap();

        let data = client.download("bucket1", "snap.db").await.unwrap();
        assert_eq!(&data[..], b"prefixed");
    }

    #[tokio::test]
    async fn test_upload_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("snap.db");
        std::fs::write(&source, b"local file").unwrap();

        let result = client(&server).upload(&source, "bucket1", "snap.db").await;
        assert!(matches!(result, Err(Error::RemoteSync(msg)) if msg.contains("403")));
    }
}
