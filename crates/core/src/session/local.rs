//! Session over a snapshot file on local disk.

use std::path::{Path, PathBuf};

use tracing::Span;

use super::{LocationTemplate, SessionMode, SnapshotSession, TemplateParams, read_record, write_record};
use crate::Error;
use crate::cache::{CachedRecord, Fingerprint, LocalStore, OpenMode};

#[derive(Debug)]
pub struct LocalSession {
    template: LocationTemplate,
    data_dir: PathBuf,
    mode: SessionMode,
    store: Option<LocalStore>,
    location: Option<String>,
    span: Span,
}

impl LocalSession {
    /// `template` resolves to a path or `file://` URI; relative paths land
    /// under `data_dir`.
    pub fn new(template: impl Into<LocationTemplate>, data_dir: impl Into<PathBuf>) -> Self {
        let template = template.into();
        let span = tracing::debug_span!("snapshot_session", kind = "local", template = template.as_str());
        Self { template, data_dir: data_dir.into(), mode: SessionMode::default(), store: None, location: None, span }
    }

    /// Directions the owning crawl uses this snapshot in. Pass-through unless set.
    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Path of the open snapshot file.
    pub fn path(&self) -> Option<&Path> {
        self.store.as_ref().and_then(LocalStore::path)
    }

    /// `location` has had any `file://` prefix removed.
    fn snapshot_path(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() { path.to_path_buf() } else { self.data_dir.join(path) }
    }

    fn backing(&self) -> Result<&LocalStore, Error> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::SessionClosed("local snapshot session is not open".into()))
    }
}

#[async_trait::async_trait]
impl SnapshotSession for LocalSession {
    async fn open(&mut self, params: &TemplateParams) -> Result<(), Error> {
        if self.store.is_some() {
            return Err(Error::Configuration("snapshot session is already open".into()));
        }

        let resolved = self.template.resolve(params)?;
        let trimmed = resolved.trim();
        let location = trimmed.strip_prefix("file://").unwrap_or(trimmed).trim();
        if location.is_empty() {
            return Err(Error::Configuration("snapshot location not configured".into()));
        }

        let path = self.snapshot_path(location);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::StorageOpen { path: path.clone(), reason: e.to_string() })?;
        }

        let store = LocalStore::open(&path, OpenMode::CreateIfMissing).await?;

        tracing::debug!(parent: &self.span, path = %path.display(), "using local snapshot store");

        self.location = Some(path.display().to_string());
        self.store = Some(store);
        Ok(())
    }

    async fn retrieve(&self, fingerprint: &Fingerprint) -> Result<Option<CachedRecord>, Error> {
        read_record(self.backing()?, fingerprint).await
    }

    async fn store(&self, fingerprint: &Fingerprint, record: &CachedRecord) -> Result<(), Error> {
        write_record(self.backing()?, fingerprint, record).await
    }

    async fn close(&mut self) -> Result<(), Error> {
        if let Some(mut store) = self.store.take() {
            store.close().await?;
            tracing::debug!(parent: &self.span, location = ?self.location, "closed local snapshot session");
        }
        Ok(())
    }

    fn mode(&self) -> SessionMode {
        self.mode
    }

    fn is_open(&self) -> bool {
        self.store.is_some()
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}
