//! Migration CLI: feed upload descriptors in, get one outcome line out per
//! upload, exit non-zero if any of them failed.

mod log;
mod source;

use anyhow::{Context, Result};
use caravel_client::{HttpDestinationClient, HttpPartCopier, HttpPartFetcher};
use caravel_core::auth::Authorization;
use caravel_pipeline::{Collaborators, MigrationConfig, migrate};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "caravel")]
#[command(about = "Migrate content-addressed uploads into a capability-based store")]
#[command(version)]
struct Args {
    /// Destination namespace DID to migrate into
    #[arg(long)]
    space: Option<String>,

    /// Base URL part bytes are fetched from
    #[arg(long)]
    gateway_url: Option<String>,

    /// Invocation bridge URL of the destination service
    #[arg(long)]
    api_url: Option<String>,

    /// JSON file holding delegation proofs for the space
    #[arg(long)]
    proof: Option<PathBuf>,

    /// NDJSON file of uploads to migrate (defaults to stdin)
    #[arg(long, conflicts_with = "from_log")]
    input: Option<PathBuf>,

    /// Re-run the failures recorded in a previous outcome log
    #[arg(long)]
    from_log: Option<PathBuf>,

    /// Append outcome lines to this NDJSON log
    #[arg(long)]
    log: Option<PathBuf>,

    /// Maximum part migrations in flight
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Fail parts whose register receipt status differs from this value
    #[arg(long)]
    expected_register_status: Option<String>,

    /// TOML config file with defaults for the connection flags
    #[arg(long, env = "CARAVEL_CONFIG")]
    config: Option<PathBuf>,
}

/// Connection defaults from the config file and `CARAVEL_*` environment.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    space: Option<String>,
    gateway_url: Option<String>,
    api_url: Option<String>,
    proof: Option<PathBuf>,
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("CARAVEL_"));
    figment.extract().context("failed to load configuration")
}

fn resolve(flag: Option<String>, fallback: Option<String>, name: &str) -> Result<String> {
    flag.or(fallback)
        .with_context(|| format!("missing {name}; pass the flag or set it in the config"))
}

async fn load_authorization(path: Option<&Path>) -> Result<Authorization> {
    let Some(path) = path else {
        tracing::warn!("no proof file configured; invocations carry no delegations");
        return Ok(Authorization::default());
    };
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read proof file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("malformed proof file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> Result<ExitCode> {
    let file_config = load_file_config(args.config.as_deref())?;
    let space = resolve(args.space, file_config.space, "--space")?;
    let gateway_url = resolve(args.gateway_url, file_config.gateway_url, "--gateway-url")?;
    let api_url = resolve(args.api_url, file_config.api_url, "--api-url")?;
    let proof_path = args.proof.or(file_config.proof);
    let auth = load_authorization(proof_path.as_deref()).await?;

    let uploads = if let Some(path) = &args.from_log {
        log::read_failed_uploads(path).await?
    } else if let Some(path) = &args.input {
        source::read_uploads_from_file(path).await?
    } else {
        source::read_uploads_from_stdin().await?
    };
    tracing::info!(uploads = uploads.len(), %space, "starting migration");

    let collaborators = Collaborators {
        fetcher: Arc::new(HttpPartFetcher::new(&gateway_url)?),
        destination: Arc::new(HttpDestinationClient::new(&api_url, &space, auth)?),
        copier: Arc::new(HttpPartCopier::new()),
    };
    let config = MigrationConfig {
        concurrency: args.concurrency,
        expected_register_status: args.expected_register_status,
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; draining in-flight parts");
            interrupt.cancel();
        }
    });

    let mut outcome_log = match &args.log {
        Some(path) => Some(log::OutcomeLog::open(path).await?),
        None => None,
    };

    let source = Box::pin(futures::stream::iter(uploads));
    let mut outcomes = Box::pin(migrate(source, collaborators, config, cancel));

    let mut migrated = 0usize;
    let mut failed = 0usize;
    while let Some(item) = outcomes.next().await {
        let outcome = item?;
        if outcome.is_success() {
            migrated += 1;
        } else {
            failed += 1;
        }

        if let Some(log) = outcome_log.as_mut() {
            log.append(&outcome).await?;
        }
        // Failures always reach stderr; successes only when no log captures
        // them.
        if !outcome.is_success() || outcome_log.is_none() {
            eprintln!("{}", serde_json::to_string(&outcome)?);
        }
    }
    if let Some(log) = outcome_log.as_mut() {
        log.flush().await?;
    }

    tracing::info!(migrated, failed, "migration finished");
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
