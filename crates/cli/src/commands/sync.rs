//! `pull` and `push` subcommands.

use std::path::{Path, PathBuf};

use serde::Serialize;
use timemachine_core::remote::{RemoteLocation, client_from_config};
use timemachine_core::{Error, TimeMachineConfig};

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutput {
    pub uri: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Download the snapshot at `uri` into `out`.
pub async fn pull_impl(config: &TimeMachineConfig, uri: &str, out: &Path) -> Result<SyncOutput, Error> {
    let location = RemoteLocation::parse(uri, &config.remote.scheme)?;
    let client = client_from_config(&config.remote)?;

    let data = client.download(&location.bucket, &location.key).await?;
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(out, &data).await?;

    tracing::info!(%location, path = %out.display(), bytes = data.len(), "pulled snapshot");

    Ok(SyncOutput { uri: uri.to_string(), path: out.to_path_buf(), bytes: data.len() as u64 })
}

/// Upload the snapshot file `db` to `uri`.
pub async fn push_impl(config: &TimeMachineConfig, db: &Path, uri: &str) -> Result<SyncOutput, Error> {
    let location = RemoteLocation::parse(uri, &config.remote.scheme)?;
    let client = client_from_config(&config.remote)?;

    let bytes = tokio::fs::metadata(db).await?.len();
    client.upload(db, &location.bucket, &location.key).await?;

    tracing::info!(%location, path = %db.display(), bytes, "pushed snapshot");

    Ok(SyncOutput { uri: uri.to_string(), path: db.to_path_buf(), bytes })
}
