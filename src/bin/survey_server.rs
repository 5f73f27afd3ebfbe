//! Survey insights HTTP server
//!
//! Environment:
//! - `PORT` (default 3000)
//! - `AGE_BUCKETS_PATH` YAML bucket scheme, built-in buckets when unset
//! - `SEED_PATH` JSON fixture for the in-memory store
//! - `DATABASE_URL` Postgres backend (requires the `database` feature)

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::ctrl_c;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use survey_insights::{api::create_router, InsightsService, MemoryStore, ServiceConfig, SurveyStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("survey_insights=info,tower_http=debug")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let scheme = config.age_buckets()?;
    let store = open_store(&config).await?;

    let app = create_router(InsightsService::new(store, scheme));

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting survey insights server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(feature = "database")]
async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn SurveyStore>> {
    use survey_insights::{DatabaseConfig, DatabaseManager};

    if let Some(url) = &config.database_url {
        let manager = DatabaseManager::new(DatabaseConfig::from_url(url.as_str()))
            .await
            .context("Failed to connect to database")?;
        if let Err(e) = manager.require_schema().await {
            manager.close().await;
            return Err(e);
        }
        return Ok(Arc::new(manager.survey_store()));
    }
    memory_store(config)
}

#[cfg(not(feature = "database"))]
async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn SurveyStore>> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL is set but the database feature is disabled; using the in-memory store");
    }
    memory_store(config)
}

fn memory_store(config: &ServiceConfig) -> Result<Arc<dyn SurveyStore>> {
    match &config.seed_path {
        Some(path) => Ok(Arc::new(MemoryStore::load_fixture_file(path)?)),
        None => {
            warn!("SEED_PATH not set, starting with an empty in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    let interrupt = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
