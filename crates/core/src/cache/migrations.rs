//! Snapshot store schema.
//!
//! Snapshot files outlive the binary that wrote them, so each file records
//! which schema versions it has in `_migrations`.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered by version.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_entries.sql"))];

/// Apply every migration newer than the file's recorded version.
///
/// # Errors
///
/// `Error::MigrationFailed` if a batch fails, which is also how a file that is
/// not a SQLite database first shows up.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
        )
        .map_err(|e| Error::MigrationFailed(e.to_string()))?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))
            .map_err(Error::from)?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            conn.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(Error::from)?;
            tracing::debug!(version, "applied snapshot store migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
