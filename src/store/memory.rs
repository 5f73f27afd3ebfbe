//! In-memory `SurveyStore`
//!
//! Backs the demo server and the test-suite. Collections live behind tokio
//! `RwLock`s; reads return records sorted by id so snapshots built from it
//! are reproducible.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::SurveyStore;
use crate::error::LegacyError;
use crate::legacy::{normalize_clients, LegacyImport};
use crate::model::{
    Answer, AnswerId, Category, CategoryId, Client, ClientId, Question, QuestionId, Survey,
    SurveyId,
};

/// JSON seed document for a `MemoryStore`.
///
/// Clients are kept as raw documents so legacy shapes can be normalized
/// once on import.
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub clients: Vec<serde_json::Value>,
    #[serde(default)]
    pub surveys: Vec<Survey>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    clients: RwLock<HashMap<ClientId, Client>>,
    surveys: RwLock<HashMap<SurveyId, Survey>>,
    questions: RwLock<HashMap<QuestionId, Question>>,
    answers: RwLock<HashMap<AnswerId, Answer>>,
    categories: RwLock<HashMap<CategoryId, Category>>,
}

fn index_by<K, V>(records: Vec<V>, key: impl Fn(&V) -> K) -> HashMap<K, V>
where
    K: Hash + Eq,
{
    records.into_iter().map(|r| (key(&r), r)).collect()
}

fn sorted_values<K: Ord + Clone, V: Clone>(map: &HashMap<K, V>) -> Vec<V> {
    let mut entries: Vec<(&K, &V)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, v)| v.clone()).collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(
        clients: Vec<Client>,
        surveys: Vec<Survey>,
        questions: Vec<Question>,
        answers: Vec<Answer>,
        categories: Vec<Category>,
    ) -> Self {
        Self {
            clients: RwLock::new(index_by(clients, |c| c.id.clone())),
            surveys: RwLock::new(index_by(surveys, |s| s.id.clone())),
            questions: RwLock::new(index_by(questions, |q| q.id.clone())),
            answers: RwLock::new(index_by(answers, |a| a.id.clone())),
            categories: RwLock::new(index_by(categories, |c| c.id.clone())),
        }
    }

    /// Build a store from a fixture, normalizing client documents.
    /// Clients that cannot be normalized are skipped and logged, as are
    /// incomplete answer entries of otherwise valid clients.
    pub fn from_fixture(fixture: Fixture) -> (Self, LegacyImport) {
        let import = normalize_clients(&fixture.clients);
        for (index, error) in &import.rejected {
            warn!("Skipping client document {}: {}", index, error);
        }
        for error in &import.incomplete_answers {
            warn!("Dropping answer entry: {}", error);
        }

        let store = Self::with_records(
            import.clients.clone(),
            fixture.surveys,
            fixture.questions,
            fixture.answers,
            fixture.categories,
        );
        (store, import)
    }

    pub fn from_fixture_str(json: &str) -> Result<Self, LegacyError> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Ok(Self::from_fixture(fixture).0)
    }

    pub fn load_fixture_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture: Fixture =
            serde_json::from_str(&content).context("Failed to parse fixture document")?;
        let (store, import) = Self::from_fixture(fixture);
        info!(
            "Seeded memory store from {}: {} clients ({} rejected, {} incomplete answers, {} legacy answer fields)",
            path.display(),
            import.clients.len(),
            import.rejected.len(),
            import.incomplete_answers.len(),
            import.legacy_answer_fields
        );
        Ok(store)
    }

    pub async fn insert_client(&self, client: Client) {
        self.clients.write().await.insert(client.id.clone(), client);
    }

    pub async fn insert_survey(&self, survey: Survey) {
        self.surveys.write().await.insert(survey.id.clone(), survey);
    }

    pub async fn insert_question(&self, question: Question) {
        self.questions
            .write()
            .await
            .insert(question.id.clone(), question);
    }

    pub async fn insert_answer(&self, answer: Answer) {
        self.answers.write().await.insert(answer.id.clone(), answer);
    }

    pub async fn insert_category(&self, category: Category) {
        self.categories
            .write()
            .await
            .insert(category.id.clone(), category);
    }

    pub async fn remove_question(&self, question_id: &QuestionId) -> Option<Question> {
        self.questions.write().await.remove(question_id)
    }

    pub async fn remove_category(&self, category_id: &CategoryId) -> Option<Category> {
        self.categories.write().await.remove(category_id)
    }

    pub async fn client(&self, client_id: &ClientId) -> Option<Client> {
        self.clients.read().await.get(client_id).cloned()
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn load_clients(&self) -> Result<Vec<Client>> {
        Ok(sorted_values(&*self.clients.read().await))
    }

    async fn load_surveys(&self) -> Result<Vec<Survey>> {
        Ok(sorted_values(&*self.surveys.read().await))
    }

    async fn load_questions(&self) -> Result<Vec<Question>> {
        Ok(sorted_values(&*self.questions.read().await))
    }

    async fn load_answers(&self) -> Result<Vec<Answer>> {
        Ok(sorted_values(&*self.answers.read().await))
    }

    async fn load_categories(&self) -> Result<Vec<Category>> {
        Ok(sorted_values(&*self.categories.read().await))
    }

    async fn save_client_recommendations(
        &self,
        client_id: &ClientId,
        categories: &[CategoryId],
    ) -> Result<bool> {
        let mut clients = self.clients.write().await;
        match clients.get_mut(client_id) {
            Some(client) => {
                client.recommended_categories = categories.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Gender;

    #[tokio::test]
    async fn test_loads_are_sorted_by_id() {
        let store = MemoryStore::with_records(
            vec![
                Client::new("c2", Gender::Male, Some(20)),
                Client::new("c1", Gender::Female, Some(30)),
            ],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );

        let clients = store.load_clients().await.unwrap();
        let ids: Vec<&str> = clients.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_save_recommendations() {
        let store = MemoryStore::new();
        store
            .insert_client(Client::new("c1", Gender::Male, None))
            .await;

        let saved = store
            .save_client_recommendations(&ClientId::from("c1"), &[CategoryId::from("citrus")])
            .await
            .unwrap();
        assert!(saved);
        let client = store.client(&ClientId::from("c1")).await.unwrap();
        assert_eq!(client.recommended_categories, vec![CategoryId::from("citrus")]);

        let missing = store
            .save_client_recommendations(&ClientId::from("nope"), &[])
            .await
            .unwrap();
        assert!(!missing);
    }

    #[test]
    fn test_fixture_normalizes_legacy_clients() {
        let json = r#"{
            "clients": [
                {"_id": "c1", "gender": "female", "age": 31,
                 "survey_answers": [{"question_id": "q1", "answer_id": "a1"}]},
                {"id": "c2", "answers": [{"questionId": "q1", "answerId": "a2"}]},
                "not a client"
            ],
            "categories": [{"id": "citrus", "name": "Citrus"}]
        }"#;
        let fixture: Fixture = serde_json::from_str(json).unwrap();
        let (_, import) = MemoryStore::from_fixture(fixture);
        assert_eq!(import.clients.len(), 2);
        assert_eq!(import.rejected.len(), 1);
        assert_eq!(import.legacy_answer_fields, 1);
    }

    #[tokio::test]
    async fn test_client_with_incomplete_answer_stays_in_store() {
        let json = r#"{
            "clients": [
                {"id": "c1", "gender": "male", "age": 30,
                 "answers": [{"questionId": "q1", "answerId": "a1"}, {"questionId": "q2"}]}
            ]
        }"#;
        let store = MemoryStore::from_fixture_str(json).unwrap();

        let clients = store.load_clients().await.unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].answers.len(), 1);
        assert_eq!(clients[0].answers[0].question_id.as_str(), "q1");
    }
}
