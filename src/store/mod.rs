//! Persistence boundary for survey data
//!
//! The engine reads the five collections and writes back one field of one
//! client through this trait; how records are stored is the backend's
//! concern (`MemoryStore` here, `PgSurveyStore` with the `database` feature).

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Answer, Category, CategoryId, Client, ClientId, Question, Survey};

pub mod memory;

pub use memory::{Fixture, MemoryStore};

/// Read access to the survey collections plus the recommendation write-back.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    // ── Collections ──

    async fn load_clients(&self) -> Result<Vec<Client>>;
    async fn load_surveys(&self) -> Result<Vec<Survey>>;
    async fn load_questions(&self) -> Result<Vec<Question>>;
    async fn load_answers(&self) -> Result<Vec<Answer>>;
    async fn load_categories(&self) -> Result<Vec<Category>>;

    // ── Write-back ──

    /// Replace a client's recommended categories.
    /// Returns `false` when no such client exists.
    async fn save_client_recommendations(
        &self,
        client_id: &ClientId,
        categories: &[CategoryId],
    ) -> Result<bool>;
}
