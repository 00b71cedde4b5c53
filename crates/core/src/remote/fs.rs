//! Object store backed by a local directory tree.
//!
//! Blobs live at `root/bucket/key`. Useful for mirrors on shared volumes and
//! for exercising remote sessions without a network.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use super::ObjectStore;
use crate::Error;

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the blob for `bucket`/`key` lives on disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLocation` unless every segment is a plain name, so
    /// no location resolves outside `root`.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(bucket).join(key);
        let plain = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain || bucket.is_empty() || key.is_empty() {
            return Err(Error::InvalidLocation(format!("{bucket}/{key}: not a plain object path")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, Error> {
        let path = self.object_path(bucket, key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::RemoteSync(format!("download {}: {e}", path.display())))?;
        Ok(Bytes::from(data))
    }

    async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<(), Error> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::RemoteSync(format!("upload {}: {e}", path.display())))?;
        }
        tokio::fs::copy(source, &path)
            .await
            .map_err(|e| Error::RemoteSync(format!("upload {}: {e}", path.display())))?;
        Ok(())
    }
}
