mod config;
mod telemetry;
mod vault;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError};
use refdata::postgres::PgStore;
use refdata::{ChunkAssembler, DataKind, IngestCoordinator, LoadError, Loader, StoreError};
use service::AppState;
use service::errors::ServiceError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use telemetry::MetricsError;
use vault::{SecretError, VaultResolver};

#[derive(Parser)]
#[command(name = "bizlogic", about = "CTO business logic helper")]
struct Cli {
    #[arg(long, default_value = "config.yaml")]
    config_file_path: PathBuf,

    /// Use config values as-is without resolving `[vault]` references.
    #[arg(long)]
    no_vault: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the HTTP service.
    Serve,
    /// Load, resolve and validate the config, then print a summary.
    CheckConfig,
    /// Run one load against the chunk file already on disk.
    Load { kind: DataKind },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("database: {0}")]
    Store(#[from] StoreError),
    #[error("load failed: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "exiting");
            eprintln!("bizlogic: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::from_file(&cli.config_file_path)?;
    let _logging = telemetry::init_logging(config.common.logging.as_ref());

    if cli.no_vault {
        tracing::warn!("running without vault; config values are used as-is");
    } else if config.has_secret_references() {
        let vault = config
            .common
            .vault
            .as_ref()
            .ok_or(SecretError::NotConfigured)?;
        let resolver = VaultResolver::from_config(vault)?;
        let resolved = config.resolve_secrets(&resolver).await?;
        tracing::info!(resolved, "resolved vault secrets");
    }
    config.validate()?;

    match cli.command {
        CliCommand::CheckConfig => {
            println!("{}", config.summary());
            Ok(())
        }
        CliCommand::Load { kind } => {
            let loader = build_loader(&config)?;
            let report = loader.load(kind).await?;
            println!(
                "{} -> {}: {} records processed, {} staged",
                report.kind, report.schema, report.processed, report.staged
            );
            Ok(())
        }
        CliCommand::Serve => serve(config).await,
    }
}

fn build_loader(config: &Config) -> Result<Loader, CliError> {
    let store = PgStore::connect_lazy(&config.database)?;
    Ok(Loader::new(
        Arc::new(config.reference_data.clone()),
        Arc::new(config.instance_environments.clone()),
        Arc::new(store),
    ))
}

async fn serve(config: Config) -> Result<(), CliError> {
    if let Some(metrics) = &config.common.metrics {
        telemetry::init_metrics(metrics)?;
    }

    let store = Arc::new(PgStore::connect_lazy(&config.database)?);
    let reference_data = Arc::new(config.reference_data);
    let schemas = Arc::new(config.instance_environments);

    let loader = Loader::new(reference_data.clone(), schemas.clone(), store.clone());
    let assembler = ChunkAssembler::new(&reference_data.chunk_dir, reference_data.max_chunk_bytes);
    let state = AppState {
        coordinator: IngestCoordinator::start(assembler, loader),
        store,
        schemas,
        reference_data,
        queries: Arc::new(config.queries),
        auth: Arc::new(config.auth),
    };

    service::serve(&config.listener, state, shutdown_signal()).await?;
    tracing::info!("service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
