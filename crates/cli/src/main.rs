//! pgstash binary: save one file into a PostgreSQL table.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pgstash_core::config::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// pgstash - store a file in PostgreSQL, inline or as a large object
#[derive(Parser, Debug)]
#[command(name = "pgstash")]
#[command(version, about, long_about = None)]
struct Args {
    /// File to save
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, env = "PGSTASH_CONFIG", default_value = "pgstash.toml")]
    config: String,

    /// Target table (overrides storage.table)
    #[arg(short, long)]
    table: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Failures are reported, not turned into an exit status.
    let Some(file) = args.file.clone() else {
        tracing::error!("No file given; pass --file <PATH>");
        return;
    };

    if let Err(e) = run(&args, &file).await {
        tracing::error!(file = %file.display(), "Save failed: {e:#}");
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let mut config: AppConfig = figment
        .merge(Env::prefixed("PGSTASH_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if let Some(table) = &args.table {
        config.storage.table = table.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(args: &Args, file: &Path) -> Result<()> {
    let config = load_config(args)?;

    let store = pgstash_store::from_config(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;
    store
        .health_check()
        .await
        .context("database health check failed")?;
    tracing::info!("Connected to PostgreSQL");

    let saver = pgstash_store::saver_from_config(Arc::new(store), &config.storage)
        .await
        .context("failed to prepare file table")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling save");
            on_signal.cancel();
        }
    });

    let saved = saver
        .save_path(file, &cancel)
        .await
        .with_context(|| format!("failed to save {}", file.display()))?;

    tracing::info!(
        id = saved.id,
        class = %saved.class,
        size = saved.size,
        table = %saver.table(),
        "Stored file"
    );
    Ok(())
}
