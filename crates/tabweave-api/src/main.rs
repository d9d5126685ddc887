//! tabweave HTTP server.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabweave_api::{router, AppConfig, AppState, PushedTabs, TabWeave};
use tabweave_db::Database;
use tabweave_inference::{AiSession, ContentAnalyzer};
use tabweave_jobs::EnrichmentWorker;

/// File name of the database inside `TABWEAVE_DATA_DIR`.
const DATABASE_FILE: &str = "tabweave.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "tabweave_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tabweave_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("tabweave.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = AppConfig::from_env()?;

    let db = match &config.data_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            let path = dir.join(DATABASE_FILE);
            info!(database = %path.display(), "Using SQLite database file");
            Database::open(path).await?
        }
        None => {
            warn!("TABWEAVE_DATA_DIR not set, state will not survive a restart");
            Database::in_memory().await?
        }
    };

    let provider = config.inference.build_provider();
    let analyzer = ContentAnalyzer::new(AiSession::detect(provider.as_ref()).await);

    let tabs = Arc::new(PushedTabs::new());
    let engine = Arc::new(
        TabWeave::new(
            db,
            tabs.clone(),
            tabs.clone(),
            analyzer,
            config.engine.clone(),
        )
        .await?,
    );

    let worker = EnrichmentWorker::new(engine.pipeline().clone(), config.worker.clone()).start();

    let maintenance = engine.spawn_maintenance(config.maintenance_interval);

    let app = router(AppState { engine, tabs });
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(bind = %config.bind, "tabweave listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    maintenance.abort();
    worker.stop().await?;
    info!("tabweave stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
