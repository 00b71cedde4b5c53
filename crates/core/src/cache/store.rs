//! Local snapshot store: a SQLite file used as a byte-keyed map.
//!
//! This module handles opening the database in one of three modes, applying
//! the connection pragmas, running migrations, and the get/put/contains
//! primitives the snapshot sessions build on.

use std::path::{Path, PathBuf};

use super::migrations;
use crate::Error;
use tokio_rusqlite::rusqlite::{self, OpenFlags};
use tokio_rusqlite::{Connection, params};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

/// Files SQLite keeps next to the main database file.
const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// How [`LocalStore::open`] treats the file at the given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open the file, creating an empty store if it does not exist.
    CreateIfMissing,
    /// Discard whatever is at the path and start an empty store.
    CreateFresh,
    /// Open a store that must already exist.
    OpenExisting,
}

/// Snapshot store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. The handle is owned by exactly one session.
#[derive(Debug)]
pub struct LocalStore {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Open a store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns `Error::StorageOpen` if the file cannot be created or opened,
    /// if `OpenExisting` is requested for a missing file, or if the file is
    /// not a usable database.
    pub async fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        let conn = Self::connect(&path, mode)
            .await
            .map_err(|e| Error::StorageOpen { path: path.clone(), reason: e.to_string() })?;

        tracing::debug!(path = %path.display(), ?mode, "opened snapshot store");

        Ok(Self { conn: Some(conn), path: Some(path) })
    }

    /// Open an in-memory store for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration and schema as file-based stores.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::StorageOpen { path: PathBuf::from(":memory:"), reason: e.to_string() })?;

        Self::prepare(&conn).await?;

        Ok(Self { conn: Some(conn), path: None })
    }

    async fn connect(path: &Path, mode: OpenMode) -> Result<Connection, Error> {
        let flags = match mode {
            OpenMode::CreateIfMissing => OpenFlags::default(),
            OpenMode::CreateFresh => {
                truncate(path).await?;
                OpenFlags::default()
            }
            OpenMode::OpenExisting => {
                if !tokio::fs::try_exists(path).await? {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "store file does not exist",
                    )));
                }
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
            }
        };

        let conn = Connection::open_with_flags(path, flags)
            .await
            .map_err(|e| Error::Database(e.into()))?;

        Self::prepare(&conn).await?;

        Ok(conn)
    }

    async fn prepare(conn: &Connection) -> Result<(), Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(conn).await
    }

    /// Path of the backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&self) -> Result<&Connection, Error> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::SessionClosed("snapshot store is closed".into()))
    }

    /// Get the value stored under `key`.
    ///
    /// Returns None if the key doesn't exist.
    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let key = key.to_vec();
        self.conn()?
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                let result = conn.query_row("SELECT value FROM entries WHERE key = ?1", params![key], |row| {
                    row.get::<_, Vec<u8>>(0)
                });

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.conn()?
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether `key` is present.
    pub async fn contains(&self, key: &[u8]) -> Result<bool, Error> {
        let key = key.to_vec();
        self.conn()?
            .call(move |conn| -> Result<bool, Error> {
                let present: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM entries WHERE key = ?1)",
                        params![key],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;

                Ok(present)
            })
            .await
            .map_err(Error::from)
    }

    /// Move everything committed into the main database file.
    ///
    /// After this returns, copying the file alone captures the whole store.
    pub async fn flush(&self) -> Result<(), Error> {
        self.conn()?
            .call(|conn| -> Result<(), Error> {
                let busy: i64 = conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))?;
                if busy != 0 {
                    return Err(Error::Io(std::io::Error::other("wal checkpoint could not complete")));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Close the connection. Calling it again, or on a store whose open
    /// failed, does nothing.
    pub async fn close(&mut self) -> Result<(), Error> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        conn.close().await.map_err(Error::from)?;

        if let Some(path) = &self.path {
            tracing::debug!(path = %path.display(), "closed snapshot store");
        }

        Ok(())
    }
}

/// Empty the file at `path` (creating it if needed) and drop SQLite sidecars.
async fn truncate(path: &Path) -> Result<(), Error> {
    tokio::fs::File::create(path).await?;
    remove_sidecars(path).await
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) async fn remove_if_exists(path: &Path) -> Result<(), Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove the SQLite sidecar files that may sit next to `path`.
pub(crate) async fn remove_sidecars(path: &Path) -> Result<(), Error> {
    for suffix in SIDECAR_SUFFIXES {
        remove_if_exists(&sidecar_path(path, suffix)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = LocalStore::open_in_memory().await.unwrap();
        assert!(store.is_open());
        assert!(store.path().is_none());
    }

    #[tokio::test]
    async fn test_put_get_contains() {
        let store = LocalStore::open_in_memory().await.unwrap();

        assert_eq!(store.get(b"k").await.unwrap(), None);
        assert!(!store.contains(b"k").await.unwrap());

        store.put(b"k", b"v1").await.unwrap();
        assert!(store.contains(b"k").await.unwrap());
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v1".to_vec()));

        store.put(b"k", b"v2").await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.db");

        let mut store = LocalStore::open(&path, OpenMode::CreateIfMissing).await.unwrap();
        store.put(b"k", b"v").await.unwrap();
        store.close().await.unwrap();

        let mut store = LocalStore::open(&path, OpenMode::OpenExisting).await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v".to_vec()));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_fresh_discards_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.db");

        let mut store = LocalStore::open(&path, OpenMode::CreateIfMissing).await.unwrap();
        store.put(b"k", b"v").await.unwrap();
        store.close().await.unwrap();

        let mut store = LocalStore::open(&path, OpenMode::CreateFresh).await.unwrap();
        assert!(!store.contains(b"k").await.unwrap());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_existing_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        let result = LocalStore::open(&path, OpenMode::OpenExisting).await;
        assert!(matches!(result, Err(Error::StorageOpen { .. })));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_open_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/snap.db");

        let result = LocalStore::open(&path, OpenMode::CreateIfMissing).await;
        assert!(matches!(result, Err(Error::StorageOpen { .. })));
    }

    #[tokio::test]
    async fn test_open_not_a_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0x42; 8192]).unwrap();

        let result = LocalStore::open(&path, OpenMode::OpenExisting).await;
        assert!(matches!(result, Err(Error::StorageOpen { .. })));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut store = LocalStore::open_in_memory().await.unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(!store.is_open());
    }

    #[tokio::test]
    async fn test_use_after_close() {
        let mut store = LocalStore::open_in_memory().await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.get(b"k").await, Err(Error::SessionClosed(_))));
        assert!(matches!(store.put(b"k", b"v").await, Err(Error::SessionClosed(_))));
    }

    #[tokio::test]
    async fn test_flush_leaves_self_contained_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.db");
        let copy = dir.path().join("copy.db");

        let mut store = LocalStore::open(&path, OpenMode::CreateIfMissing).await.unwrap();
        store.put(b"k", b"v").await.unwrap();
        store.flush().await.unwrap();
        std::fs::copy(&path, &copy).unwrap();
        store.close().await.unwrap();

        let mut copied = LocalStore::open(&copy, OpenMode::OpenExisting).await.unwrap();
        assert_eq!(copied.get(b"k").await.unwrap(), Some(b"v".to_vec()));
        copied.close().await.unwrap();
    }
}
