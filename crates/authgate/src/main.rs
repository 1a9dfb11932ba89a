//! authgate - token-issuing authentication service

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod bootstrap;
mod config;
mod maintenance;

use authgate_api::{AppState, create_router};
use authgate_auth::JwtManager;
use authgate_db::Database;
use bootstrap::bootstrap_admin;
use config::{Config, LogFormat, LoggingConfig, sqlite_file_path};
use maintenance::{prune_expired_refresh_tokens, spawn_pruning_task};

/// How often expired refresh tokens are removed while running
const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// authgate - JWT authentication service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "AUTHGATE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration problems are fatal before anything else starts
    let config = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting authgate v{}", env!("CARGO_PKG_VERSION"));
    if Path::new(&args.config).exists() {
        info!("Loaded configuration from {}", args.config);
    } else {
        info!("Config file not found at {}, using environment only", args.config);
    }

    let jwt = Arc::new(
        JwtManager::new(config.to_jwt_config()).context("Invalid token signing configuration")?,
    );

    // Initialize database
    if let Some(path) = sqlite_file_path(&config.database.url)
        && let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }
    let db = Database::new(&config.database.url)
        .await
        .context("Failed to open database")?;
    db.ensure_roles().await?;

    prune_expired_refresh_tokens(&db).await?;

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&db, admin).await?;
    }

    let pruning_task = spawn_pruning_task(db.clone(), PRUNE_INTERVAL);

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let state = AppState::new(db, jwt, config.registration.allow_self_service_admin);

    let app = create_router(state, Some(metrics_handle)).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);
    info!("Token issuer: {}", config.jwt.issuer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruning_task.abort();
    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
