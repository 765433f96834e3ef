//! Price Oracle - supervised price aggregation
//!
//! Main entry point for the aggregation service

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use oracle_core::OracleConfig;
use oracle_daemon::CancelToken;
use oracle_server::Orchestrator;
use oracle_store::{create_pool, DbPoolConfig, MemoryStore, PgStore, PriceStore};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &OracleConfig) -> anyhow::Result<Arc<dyn PriceStore>> {
    match &config.database.url {
        Some(url) => {
            let pool = create_pool(url, &DbPoolConfig::from(&config.database))
                .await
                .context("Failed to connect to database")?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            warn!("No database URL configured, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never
/// fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let config = OracleConfig::load().context("Failed to load configuration")?;
    let store = open_store(&config).await?;

    let done = CancelToken::new();
    tokio::spawn({
        let done = done.clone();
        async move {
            shutdown_signal().await;
            done.cancel();
        }
    });

    info!("Press Ctrl+C to shutdown");
    let shutdown = Orchestrator::new(config, store).run(done).await;

    if shutdown.is_fatal() {
        error!("Service stopped: {:?}", shutdown);
        return Ok(ExitCode::FAILURE);
    }

    info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file
    dotenvy::dotenv().ok();

    init_logging();
    info!("Starting Price Oracle v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
