//! Session over a snapshot kept in an object store.
//!
//! The snapshot is staged in a fresh temporary file for the session's
//! lifetime. With `retrieve` set, the remote blob is downloaded into the
//! staging file on open; with `record` set, the staging file is uploaded back
//! on close. The staging file is removed on close whether or not the upload
//! succeeds, and on any open failure after it was created.

use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::Span;

use super::{LocationTemplate, SessionMode, SnapshotSession, TemplateParams, read_record, write_record};
use crate::Error;
use crate::cache::store::remove_sidecars;
use crate::cache::{CachedRecord, Fingerprint, LocalStore, OpenMode};
use crate::remote::{ObjectStore, RemoteLocation};

#[derive(Debug)]
pub struct RemoteSession {
    template: LocationTemplate,
    scheme: String,
    mode: SessionMode,
    client: Arc<dyn ObjectStore>,
    staging: Option<NamedTempFile>,
    store: Option<LocalStore>,
    remote: Option<RemoteLocation>,
    uri: Option<String>,
    span: Span,
}

impl RemoteSession {
    /// `template` resolves to `{scheme}://bucket/path`.
    pub fn new(
        template: impl Into<LocationTemplate>, scheme: &str, mode: SessionMode, client: Arc<dyn ObjectStore>,
    ) -> Self {
        let template = template.into();
        let span = tracing::debug_span!(
            "snapshot_session",
            kind = "remote",
            template = template.as_str(),
            retrieve = mode.retrieve,
            record = mode.record
        );
        Self {
            template,
            scheme: scheme.to_string(),
            mode,
            client,
            staging: None,
            store: None,
            remote: None,
            uri: None,
            span,
        }
    }

    /// Local file mirroring the snapshot while the session is open.
    pub fn staging_path(&self) -> Option<&Path> {
        self.staging.as_ref().map(NamedTempFile::path)
    }

    fn backing(&self) -> Result<&LocalStore, Error> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::SessionClosed("remote snapshot session is not open".into()))
    }

    /// Fill the staging file (when replaying) and open the store over it.
    async fn hydrate(&self, staging: &Path, remote: &RemoteLocation) -> Result<LocalStore, Error> {
        if !self.mode.retrieve {
            return LocalStore::open(staging, OpenMode::CreateFresh).await;
        }

        let data = self.client.download(&remote.bucket, &remote.key).await?;
        tokio::fs::write(staging, &data)
            .await
            .map_err(|e| Error::StorageOpen { path: staging.to_path_buf(), reason: e.to_string() })?;

        tracing::info!(parent: &self.span, %remote, bytes = data.len(), "downloaded time machine snapshot");

        LocalStore::open(staging, OpenMode::OpenExisting).await
    }

    /// Flush, close, then upload the staging file.
    async fn persist(&self, store: &mut LocalStore) -> Result<(), Error> {
        let (Some(remote), Some(staging)) = (&self.remote, &self.staging) else {
            return Err(Error::SessionClosed("remote snapshot session has no staging file".into()));
        };

        store.flush().await?;
        store.close().await?;
        self.client.upload(staging.path(), &remote.bucket, &remote.key).await?;

        tracing::info!(parent: &self.span, uri = ?self.uri, "uploaded time machine snapshot");

        Ok(())
    }

    async fn release_staging(&mut self) -> Result<(), Error> {
        let Some(staging) = self.staging.take() else {
            return Ok(());
        };

        let path = staging.path().to_path_buf();
        staging.close()?;
        remove_sidecars(&path).await
    }
}

#[async_trait::async_trait]
impl SnapshotSession for RemoteSession {
    async fn open(&mut self, params: &TemplateParams) -> Result<(), Error> {
        if self.store.is_some() {
            return Err(Error::Configuration("snapshot session is already open".into()));
        }

        let uri = self.template.resolve(params)?;
        if uri.trim().is_empty() {
            return Err(Error::Configuration("snapshot location not configured".into()));
        }
        let remote = RemoteLocation::parse(&uri, &self.scheme)?;

        let staging = tempfile::Builder::new()
            .prefix("timemachine-")
            .suffix(".db")
            .tempfile()?;

        match self.hydrate(staging.path(), &remote).await {
            Ok(store) => {
                tracing::debug!(
                    parent: &self.span,
                    %uri,
                    staging = %staging.path().display(),
                    "using remote snapshot store"
                );
                self.staging = Some(staging);
                self.store = Some(store);
                self.remote = Some(remote);
                self.uri = Some(uri);
                Ok(())
            }
            Err(e) => {
                let path = staging.path().to_path_buf();
                if let Err(cleanup) = staging.close() {
                    tracing::warn!(parent: &self.span, error = %cleanup, "failed to remove staging file");
                }
                if let Err(cleanup) = remove_sidecars(&path).await {
                    tracing::warn!(parent: &self.span, error = %cleanup, "failed to remove staging sidecars");
                }
                Err(e)
            }
        }
    }

    async fn retrieve(&self, fingerprint: &Fingerprint) -> Result<Option<CachedRecord>, Error> {
        read_record(self.backing()?, fingerprint).await
    }

    async fn store(&self, fingerprint: &Fingerprint, record: &CachedRecord) -> Result<(), Error> {
        write_record(self.backing()?, fingerprint, record).await
    }

    async fn close(&mut self) -> Result<(), Error> {
        let Some(mut store) = self.store.take() else {
            return self.release_staging().await;
        };

        let synced = if self.mode.record { self.persist(&mut store).await } else { Ok(()) };
        let closed = store.close().await;
        let released = self.release_staging().await;

        if let Err(e) = &synced {
            tracing::warn!(parent: &self.span, uri = ?self.uri, error = %e, "snapshot upload failed");
        }

        synced.and(closed).and(released)
    }

    fn mode(&self) -> SessionMode {
        self.mode
    }

    fn is_open(&self) -> bool {
        self.store.is_some()
    }

    fn location(&self) -> Option<&str> {
        self.uri.as_deref()
    }
}
