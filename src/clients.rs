//! Client list and answer sheet views
//!
//! Read-only projections over a snapshot for the admin client pages. The
//! age-group filter uses the same [`AgeBucketScheme`] as the statistics, so
//! a client shown under "18-30" here is counted under "18-30" there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{AgeBucketScheme, AgeClass};
use crate::error::{InsightsError, Result};
use crate::model::{AnswerId, Client, ClientId, Gender, QuestionId, SurveyId};
use crate::snapshot::Snapshot;

pub const UNKNOWN_CATEGORY: &str = "Unknown";
pub const UNKNOWN_SURVEY: &str = "Unknown survey";
pub const UNKNOWN_QUESTION: &str = "Unknown question";
pub const UNKNOWN_ANSWER: &str = "Unknown answer";

// ============================================================================
// Filter
// ============================================================================

/// Raw filter parameters as received on `GET /clients`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientQuery {
    pub survey: Option<String>,
    pub gender: Option<String>,
    pub age_group: Option<String>,
}

/// Validated client filter; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFilter {
    pub survey: Option<SurveyId>,
    pub gender: Option<Gender>,
    /// Index into the bucket scheme
    pub age_group: Option<usize>,
}

impl ClientFilter {
    pub fn from_query(query: &ClientQuery, scheme: &AgeBucketScheme) -> Result<Self> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let gender = match non_empty(&query.gender) {
            Some(raw) => Some(Gender::parse(&raw).ok_or_else(|| {
                InsightsError::InvalidFilter(format!("unknown gender '{}'", raw))
            })?),
            None => None,
        };

        let age_group = match non_empty(&query.age_group) {
            Some(label) => Some(scheme.index_of(&label).ok_or_else(|| {
                InsightsError::InvalidFilter(format!("unknown age group '{}'", label))
            })?),
            None => None,
        };

        Ok(Self {
            survey: non_empty(&query.survey).map(SurveyId::from),
            gender,
            age_group,
        })
    }

    pub fn matches(&self, snapshot: &Snapshot, scheme: &AgeBucketScheme, client: &Client) -> bool {
        if self.gender.is_some_and(|g| g != client.gender) {
            return false;
        }
        if let Some(bucket) = self.age_group {
            if scheme.classify(client.age) != AgeClass::Bucket(bucket) {
                return false;
            }
        }
        if let Some(survey_id) = &self.survey {
            if !surveys_taken(snapshot, client).contains(&survey_id) {
                return false;
            }
        }
        true
    }
}

/// Surveys the client answered at least one resolvable question of, in id order
fn surveys_taken<'a>(snapshot: &'a Snapshot, client: &Client) -> Vec<&'a SurveyId> {
    let mut taken: Vec<&SurveyId> = client
        .answers
        .iter()
        .filter(|pair| snapshot.resolve_pair(pair).is_ok())
        .flat_map(|pair| snapshot.surveys_for_question(&pair.question_id))
        .collect();
    taken.sort();
    taken.dedup();
    taken
}

// ============================================================================
// Client list
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: ClientId,
    pub gender: Gender,
    pub age: Option<i64>,
    pub age_group: Option<String>,
    pub surveys: Vec<String>,
    /// Names from the cached recommendation list
    pub recommended_categories: Vec<String>,
}

pub fn list_clients(
    snapshot: &Snapshot,
    scheme: &AgeBucketScheme,
    filter: &ClientFilter,
) -> Vec<ClientSummary> {
    snapshot
        .clients_sorted()
        .into_iter()
        .filter(|client| filter.matches(snapshot, scheme, client))
        .map(|client| ClientSummary {
            id: client.id.clone(),
            gender: client.gender,
            age: client.age,
            age_group: scheme.label_for(client.age).map(str::to_string),
            surveys: surveys_taken(snapshot, client)
                .into_iter()
                .filter_map(|id| snapshot.survey(id))
                .map(|s| s.name.clone())
                .collect(),
            recommended_categories: client
                .recommended_categories
                .iter()
                .map(|id| {
                    snapshot
                        .category(id)
                        .map_or_else(|| UNKNOWN_CATEGORY.to_string(), |c| c.name.clone())
                })
                .collect(),
        })
        .collect()
}

// ============================================================================
// Answer sheet
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetEntry {
    pub question_id: QuestionId,
    pub question: String,
    pub answer_id: AnswerId,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySheet {
    /// `None` for answers to questions no survey lists
    pub survey_id: Option<SurveyId>,
    pub survey_name: String,
    pub answers: Vec<SheetEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSheet {
    pub client_id: ClientId,
    pub surveys: Vec<SurveySheet>,
}

/// A client's answers grouped by survey, `None` when the client is unknown
pub fn answer_sheet(snapshot: &Snapshot, client_id: &ClientId) -> Option<AnswerSheet> {
    let client = snapshot.client(client_id)?;

    let mut grouped: BTreeMap<&SurveyId, Vec<SheetEntry>> = BTreeMap::new();
    let mut ungrouped = Vec::new();

    for pair in &client.answers {
        let entry = SheetEntry {
            question_id: pair.question_id.clone(),
            question: snapshot
                .question(&pair.question_id)
                .map_or_else(|| UNKNOWN_QUESTION.to_string(), |q| q.text.clone()),
            answer_id: pair.answer_id.clone(),
            answer: snapshot
                .answer(&pair.answer_id)
                .map_or_else(|| UNKNOWN_ANSWER.to_string(), |a| a.text.clone()),
        };

        let surveys = snapshot.surveys_for_question(&pair.question_id);
        if surveys.is_empty() {
            ungrouped.push(entry);
            continue;
        }
        for survey_id in surveys {
            grouped.entry(survey_id).or_default().push(entry.clone());
        }
    }

    let mut surveys: Vec<SurveySheet> = grouped
        .into_iter()
        .map(|(survey_id, answers)| SurveySheet {
            survey_id: Some(survey_id.clone()),
            survey_name: snapshot
                .survey(survey_id)
                .map_or_else(|| UNKNOWN_SURVEY.to_string(), |s| s.name.clone()),
            answers,
        })
        .collect();
    if !ungrouped.is_empty() {
        surveys.push(SurveySheet {
            survey_id: None,
            survey_name: UNKNOWN_SURVEY.to_string(),
            answers: ungrouped,
        });
    }

    Some(AnswerSheet {
        client_id: client.id.clone(),
        surveys,
    })
}
