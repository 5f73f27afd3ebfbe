//! Survey Insights - survey analytics and category recommendations
//!
//! Turns raw client survey responses into per-question answer statistics,
//! age × gender breakdowns and ranked product-category recommendations.
//!
//! ## Flow
//! Store -> `load_snapshot` -> {tallies, demographics} and
//! per-client resolution -> popularity ranking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use survey_insights::{load_snapshot, AgeBucketScheme, MemoryStore, StatisticsReport};
//!
//! # async fn run() -> survey_insights::Result<()> {
//! let store = MemoryStore::new();
//! let snapshot = load_snapshot(&store).await?;
//! let report = StatisticsReport::build(&snapshot, &AgeBucketScheme::default());
//! println!("{} questions", report.questions.len());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Records and configuration
pub mod config;
pub mod model;

// Legacy client document normalization
pub mod legacy;

// Persistence boundary
pub mod store;

// Database integration (when enabled)
#[cfg(feature = "database")]
pub mod database;

// Aggregation engine
pub mod analytics;
pub mod snapshot;
pub mod statistics;

// Read models and orchestration
pub mod clients;
pub mod service;

// REST API (when enabled)
#[cfg(feature = "server")]
pub mod api;

pub use analytics::{
    completed_surveys, rank_categories, resolve_all, resolve_client, AnswerTallies,
    DemographicMatrix, PopularityRanking, Recommendation, SkipReason,
};
pub use config::{AgeBucket, AgeBucketScheme, AgeClass, ServiceConfig};
pub use error::{ConfigError, InsightsError, LegacyError, Result};
pub use model::{
    Answer, AnswerId, Category, CategoryId, Client, ClientAnswer, ClientId, Gender, Question,
    QuestionId, Survey, SurveyId,
};
pub use service::{InsightsService, RecomputeSummary};
pub use snapshot::{load_snapshot, Snapshot, Unresolved};
pub use statistics::StatisticsReport;
pub use store::{MemoryStore, SurveyStore};

#[cfg(feature = "database")]
pub use database::{DatabaseConfig, DatabaseManager, PgSurveyStore};
