//! Point-in-time snapshot of the survey collections
//!
//! Every aggregation pass works on one immutable `Snapshot`. Lookups are
//! keyed by id, so a reference to a record that vanished between reads is
//! an explicit [`Unresolved`] value rather than a silent miss.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{InsightsError, Result};
use crate::model::{
    Answer, AnswerId, Category, CategoryId, Client, ClientAnswer, ClientId, Question, QuestionId,
    Survey, SurveyId,
};
use crate::store::SurveyStore;

/// Why a client's `{question, answer}` pair could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unresolved {
    UnknownQuestion,
    UnknownAnswer,
    AnswerNotInQuestion,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Unresolved::UnknownQuestion => "question not found",
            Unresolved::UnknownAnswer => "answer not found",
            Unresolved::AnswerNotInQuestion => "answer does not belong to question",
        };
        f.write_str(text)
    }
}

/// Immutable view of the five collections for one aggregation pass
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub clients: HashMap<ClientId, Client>,
    pub surveys: HashMap<SurveyId, Survey>,
    pub questions: HashMap<QuestionId, Question>,
    pub answers: HashMap<AnswerId, Answer>,
    pub categories: HashMap<CategoryId, Category>,
    /// Question id -> surveys listing it, in survey id order
    question_surveys: HashMap<QuestionId, Vec<SurveyId>>,
}

fn index_records<K, V>(collection: &str, records: Vec<V>, key: impl Fn(&V) -> &K) -> HashMap<K, V>
where
    K: Hash + Eq + Clone + fmt::Display,
{
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        let id = key(&record).clone();
        if map.insert(id.clone(), record).is_some() {
            warn!("Duplicate {} id '{}', keeping the last record", collection, id);
        }
    }
    map
}

impl Snapshot {
    pub fn from_records(
        clients: Vec<Client>,
        surveys: Vec<Survey>,
        questions: Vec<Question>,
        answers: Vec<Answer>,
        categories: Vec<Category>,
    ) -> Self {
        let surveys = index_records("survey", surveys, |s| &s.id);

        let mut survey_ids: Vec<&SurveyId> = surveys.keys().collect();
        survey_ids.sort();
        let mut question_surveys: HashMap<QuestionId, Vec<SurveyId>> = HashMap::new();
        for survey_id in survey_ids {
            for question_id in &surveys[survey_id].question_ids {
                let listed = question_surveys.entry(question_id.clone()).or_default();
                if !listed.contains(survey_id) {
                    listed.push(survey_id.clone());
                }
            }
        }

        Self {
            clients: index_records("client", clients, |c| &c.id),
            surveys,
            questions: index_records("question", questions, |q| &q.id),
            answers: index_records("answer", answers, |a| &a.id),
            categories: index_records("category", categories, |c| &c.id),
            question_surveys,
        }
    }

    pub fn client(&self, id: &ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn survey(&self, id: &SurveyId) -> Option<&Survey> {
        self.surveys.get(id)
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.get(id)
    }

    pub fn answer(&self, id: &AnswerId) -> Option<&Answer> {
        self.answers.get(id)
    }

    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.get(id)
    }

    /// Surveys that list the question
    pub fn surveys_for_question(&self, id: &QuestionId) -> &[SurveyId] {
        self.question_surveys
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Clients in id order
    pub fn clients_sorted(&self) -> Vec<&Client> {
        let mut clients: Vec<&Client> = self.clients.values().collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        clients
    }

    /// Surveys in id order
    pub fn surveys_sorted(&self) -> Vec<&Survey> {
        let mut surveys: Vec<&Survey> = self.surveys.values().collect();
        surveys.sort_by(|a, b| a.id.cmp(&b.id));
        surveys
    }

    /// Resolve a client's answer pair against the snapshot
    pub fn resolve_pair(&self, pair: &ClientAnswer) -> std::result::Result<(&Question, &Answer), Unresolved> {
        let question = self
            .question(&pair.question_id)
            .ok_or(Unresolved::UnknownQuestion)?;
        let answer = self
            .answer(&pair.answer_id)
            .ok_or(Unresolved::UnknownAnswer)?;
        if !question.offers(&pair.answer_id) {
            return Err(Unresolved::AnswerNotInQuestion);
        }
        Ok((question, answer))
    }
}

/// Fetch all five collections; fails as a whole if any read fails
pub async fn load_snapshot<S: SurveyStore + ?Sized>(store: &S) -> Result<Snapshot> {
    let (clients, surveys, questions, answers, categories) = tokio::try_join!(
        async {
            store
                .load_clients()
                .await
                .map_err(|e| InsightsError::data_unavailable("clients", e))
        },
        async {
            store
                .load_surveys()
                .await
                .map_err(|e| InsightsError::data_unavailable("surveys", e))
        },
        async {
            store
                .load_questions()
                .await
                .map_err(|e| InsightsError::data_unavailable("questions", e))
        },
        async {
            store
                .load_answers()
                .await
                .map_err(|e| InsightsError::data_unavailable("answers", e))
        },
        async {
            store
                .load_categories()
                .await
                .map_err(|e| InsightsError::data_unavailable("categories", e))
        },
    )?;

    info!(
        "Loaded snapshot: {} clients, {} surveys, {} questions, {} answers, {} categories",
        clients.len(),
        surveys.len(),
        questions.len(),
        answers.len(),
        categories.len()
    );

    Ok(Snapshot::from_records(
        clients, surveys, questions, answers, categories,
    ))
}
