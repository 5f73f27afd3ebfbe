//! Postgres connection management
//!
//! Pool configuration and the `PgSurveyStore` backend. Compiled only with
//! the `database` feature.

use anyhow::{bail, Context};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::{info, warn};

pub mod pg_store;

pub use pg_store::PgSurveyStore;

/// Tables the engine expects in the `survey` schema
const SURVEY_TABLES: [&str; 5] = ["clients", "surveys", "questions", "answers", "categories"];

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    /// Pool settings for the given URL; `DATABASE_POOL_SIZE` overrides the size
    pub fn from_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Database connection manager
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Open the pool; the URL is logged with its password masked
    pub async fn new(config: DatabaseConfig) -> Result<Self, sqlx::Error> {
        let target = mask_database_url(&config.database_url);
        let options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout)
            .idle_timeout(config.idle_timeout);

        match options.connect(&config.database_url).await {
            Ok(pool) => {
                info!(
                    "Survey store connected to {} (pool size {})",
                    target, config.max_connections
                );
                Ok(Self { pool })
            }
            Err(e) => {
                warn!("Survey store could not reach {}: {}", target, e);
                Err(e)
            }
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn survey_store(&self) -> PgSurveyStore {
        PgSurveyStore::new(self.pool.clone())
    }

    /// Check that the survey tables exist; returns the names of missing ones
    pub async fn verify_schema(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = 'survey'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let present: Vec<String> = rows.iter().map(|r| r.get("table_name")).collect();
        let missing: Vec<String> = SURVEY_TABLES
            .iter()
            .filter(|t| !present.iter().any(|p| p.as_str() == **t))
            .map(|t| t.to_string())
            .collect();

        if missing.is_empty() {
            info!("Survey schema verified");
        } else {
            warn!(
                "Survey tables missing: {}. Run migrations/001_survey_schema.sql",
                missing.join(", ")
            );
        }
        Ok(missing)
    }

    /// Fail unless every survey table exists
    pub async fn require_schema(&self) -> anyhow::Result<()> {
        let missing = self
            .verify_schema()
            .await
            .context("Failed to inspect survey schema")?;
        ensure_schema_complete(&missing)
    }

    pub async fn close(self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

fn ensure_schema_complete(missing: &[String]) -> anyhow::Result<()> {
    if !missing.is_empty() {
        bail!(
            "Survey schema incomplete, missing tables: {}",
            missing.join(", ")
        );
    }
    Ok(())
}

/// Hide the password of a database URL for logging
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
