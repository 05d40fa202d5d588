//! Heapsat service
//!
//! HTTP deployment wrapper around the solve pipeline:
//! - `POST /solve` runs one bounded solver → verifier → refiner loop
//! - `GET /healthz` / `GET /status` for deployment probes
//!
//! The LLM backend is configured through the environment (`OPENAI_API_KEY`,
//! `OPENAI_BASE_URL`, `OPENAI_MODEL`); the server never persists state
//! beyond optional per-solve session logs.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

mod backend;
mod server;
mod session_log;

#[derive(Parser)]
#[command(name = "heapsat-service")]
#[command(
    author,
    version,
    about = "LLM-proposed valuations for symbolic Java heap constraints"
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Directory for per-solve session logs (disabled when unset).
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// File with reference information prepended to every solve prompt.
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Refiner attempts per solve (overrides HEAPSAT_MAX_RETRIES).
    #[arg(long)]
    max_retries: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let context = match cli.context_file.as_ref() {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read context file: {}", path.display()))?,
        None => String::new(),
    };

    let max_retries = match cli.max_retries {
        Some(n) => n,
        None => backend::default_max_retries()?,
    };

    eprintln!(
        "{} solve service (refiner budget: {})",
        "heapsat".green().bold(),
        max_retries
    );

    server::serve(server::ServiceConfig {
        listen: cli.listen,
        log_dir: cli.log_dir,
        context,
        max_retries,
    })
    .await
}
