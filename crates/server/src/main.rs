//! DSS server binary.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dss_core::config::{AppConfig, MetadataConfig};
use dss_server::bootstrap::ensure_tokens;
use dss_server::reconcile::DEFAULT_BATCH_SIZE;
use dss_server::{AppState, ReconcileOptions, create_router, run_reconcile};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// DSS - a key-addressed file storage service
#[derive(Parser, Debug)]
#[command(name = "dssd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "DSS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Fill missing content hashes and report orphaned rows
    Reconcile {
        /// Re-hash rows that already have a hash and report mismatches
        #[arg(long)]
        verify: bool,
        /// Report only; do not write hashes
        #[arg(long)]
        dry_run: bool,
        /// Catalog rows fetched per page
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: u32,
    },
}

/// Layer configuration: defaults, then the file, then the legacy
/// `MOUNT_PATH`/`DATABASE_URL` variables, then `DSS_*` variables.
fn load_config(config_path: Option<&PathBuf>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }

    if let Ok(mount_path) = std::env::var("MOUNT_PATH")
        && !mount_path.is_empty()
    {
        figment = figment.merge(Serialized::default("storage.path", mount_path));
    }

    if let Ok(database_url) = std::env::var("DATABASE_URL")
        && !database_url.is_empty()
    {
        figment = figment.merge(Serialized::default(
            "metadata",
            MetadataConfig::postgres_url(database_url),
        ));
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("DSS_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if let Err(e) = config.validate() {
        bail!("invalid configuration: {e}");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("dssd v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.as_ref())?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Reconcile {
            verify,
            dry_run,
            batch_size,
        } => {
            reconcile(
                config,
                ReconcileOptions {
                    verify,
                    dry_run,
                    batch_size,
                },
            )
            .await
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    dss_server::metrics::register_metrics();

    let storage = dss_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(
        backend = storage.backend_name(),
        root = %config.storage.path.display(),
        "Storage backend initialized"
    );

    let metadata = dss_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    ensure_tokens(metadata.as_ref(), &config.auth).await?;

    let bind = config.server.bind.clone();
    let state = AppState::new(config, storage, metadata);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind to {bind}"))?;
    tracing::info!(bind = %bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn reconcile(config: AppConfig, options: ReconcileOptions) -> Result<()> {
    let storage = dss_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    let metadata = dss_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;

    let report = run_reconcile(metadata.as_ref(), storage.as_ref(), options)
        .await
        .context("reconciliation aborted")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
