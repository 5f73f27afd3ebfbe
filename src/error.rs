//! Error types for the survey insights engine
//!
//! Only snapshot loading, write-back and configuration can fail. Bad records
//! inside a snapshot never surface here; they are routed into the
//! diagnostics carried by each aggregation result.

use thiserror::Error;

/// Main error type for the engine and its HTTP surface
#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Data unavailable: failed to read '{collection}' collection")]
    DataUnavailable {
        collection: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Write-back failed for client '{client_id}'")]
    WriteBack {
        client_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Legacy record error: {0}")]
    Legacy(#[from] LegacyError),
}

impl InsightsError {
    pub fn data_unavailable(collection: &'static str, source: anyhow::Error) -> Self {
        InsightsError::DataUnavailable { collection, source }
    }

    pub fn client_not_found(id: impl Into<String>) -> Self {
        InsightsError::NotFound {
            entity: "Client",
            id: id.into(),
        }
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid age bucket scheme: {0}")]
    InvalidBuckets(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Errors raised while normalizing legacy client documents
#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("Client document is not a JSON object")]
    NotAnObject,

    #[error("Client document has no id")]
    MissingId,

    #[error("Answer entry {index} of client '{client_id}' has no {field}")]
    IncompleteAnswer {
        client_id: String,
        index: usize,
        field: &'static str,
    },

    #[error("Fixture parse error: {0}")]
    Fixture(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;
