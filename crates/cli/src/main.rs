//! timemachine command line entry point.
//!
//! Inspects and moves snapshot stores. Logging goes to stderr so command
//! output on stdout stays machine readable.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use timemachine_core::TimeMachineConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "timemachine", version, about = "Inspect and sync response snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the fingerprint of a request under the configured policy.
    Fingerprint {
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request header as `Name: value`. Repeatable.
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Print a stored record as JSON.
    Get {
        /// Snapshot store file.
        #[arg(long)]
        db: PathBuf,
        fingerprint: String,
        /// Write the decompressed body to this file.
        #[arg(long)]
        body_out: Option<PathBuf>,
    },
    /// Download a remote snapshot to a local file.
    Pull {
        uri: String,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Upload a local snapshot file to a remote location.
    Push { db: PathBuf, uri: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = TimeMachineConfig::load()?;

    match cli.command {
        Command::Fingerprint { url, method, headers, body } => {
            let params = commands::FingerprintParams { method, url, headers, body };
            let output = commands::fingerprint::fingerprint_impl(&config, params)?;
            println!("{}", output.fingerprint);
        }
        Command::Get { db, fingerprint, body_out } => {
            let params = commands::GetParams { db, fingerprint, body_out };
            let output = commands::get::get_impl(params).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Pull { uri, out } => {
            let output = commands::sync::pull_impl(&config, &uri, &out).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Push { db, uri } => {
            let output = commands::sync::push_impl(&config, &db, &uri).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
