//! One-time normalization of legacy client documents
//!
//! Older client records stored their survey responses under one of several
//! field names and mixed `snake_case`/`camelCase` keys. Those documents are
//! converted into [`Client`] records here, once, at import time. Nothing
//! downstream ever looks up alternative field names.

use serde_json::Value;
use tracing::debug;

use crate::error::LegacyError;
use crate::model::{CategoryId, Client, ClientAnswer, Gender};

/// Answer field names found on legacy client documents, in lookup order
pub const LEGACY_ANSWER_FIELDS: [&str; 5] = [
    "survey_answers",
    "surveyAnswers",
    "answers",
    "survey",
    "responses",
];

/// Outcome of normalizing a batch of client documents
#[derive(Debug, Default)]
pub struct LegacyImport {
    pub clients: Vec<Client>,
    /// Document index and the reason it was rejected
    pub rejected: Vec<(usize, LegacyError)>,
    /// Documents whose answers came from a field other than `answers`
    pub legacy_answer_fields: usize,
    /// Documents whose gender value was present but not recognised
    pub unrecognised_genders: usize,
    /// Answer entries dropped for lacking a question or answer id; their
    /// clients are kept with the remaining pairs
    pub incomplete_answers: Vec<LegacyError>,
}

/// Normalize every document, keeping going past bad ones
pub fn normalize_clients(documents: &[Value]) -> LegacyImport {
    let mut import = LegacyImport::default();

    for (index, document) in documents.iter().enumerate() {
        match normalize_document(document) {
            Ok(normalized) => {
                if normalized.answer_field.is_some_and(|f| f != "answers") {
                    import.legacy_answer_fields += 1;
                }
                if normalized.unrecognised_gender {
                    import.unrecognised_genders += 1;
                }
                import.incomplete_answers.extend(normalized.incomplete);
                import.clients.push(normalized.client);
            }
            Err(e) => import.rejected.push((index, e)),
        }
    }

    import
}

/// Normalize a single client document. Incomplete answer entries are
/// dropped; use [`normalize_clients`] to have them reported.
pub fn normalize_client_document(document: &Value) -> Result<Client, LegacyError> {
    normalize_document(document).map(|n| n.client)
}

struct Normalized {
    client: Client,
    answer_field: Option<&'static str>,
    unrecognised_gender: bool,
    incomplete: Vec<LegacyError>,
}

fn normalize_document(document: &Value) -> Result<Normalized, LegacyError> {
    let object = document.as_object().ok_or(LegacyError::NotAnObject)?;

    let id = ["_id", "id"]
        .iter()
        .find_map(|key| object.get(*key).and_then(id_string))
        .ok_or(LegacyError::MissingId)?;

    let raw_gender = object.get("gender").and_then(Value::as_str);
    let parsed_gender = raw_gender.map(Gender::parse);
    let unrecognised_gender = matches!(parsed_gender, Some(None));
    if unrecognised_gender {
        debug!("Client {} has unrecognised gender {:?}", id, raw_gender);
    }
    let gender = parsed_gender.flatten().unwrap_or_default();

    let age = object.get("age").and_then(age_value);

    let mut answer_field = None;
    let mut answers = Vec::new();
    let mut incomplete = Vec::new();
    for field in LEGACY_ANSWER_FIELDS {
        let Some(entries) = object.get(field).and_then(Value::as_array) else {
            continue;
        };
        if entries.is_empty() {
            continue;
        }

        for (index, entry) in entries.iter().enumerate() {
            match answer_entry(&id, index, entry) {
                Ok(pair) => answers.push(pair),
                Err(e) => {
                    debug!("{}", e);
                    incomplete.push(e);
                }
            }
        }
        answer_field = Some(field);
        break;
    }

    let recommended_categories = ["recommended_categories", "recommendedCategories"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
        .map(|ids| {
            ids.iter()
                .filter_map(id_string)
                .map(CategoryId::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(Normalized {
        client: Client {
            id: id.into(),
            gender,
            age,
            answers,
            recommended_categories,
        },
        answer_field,
        unrecognised_gender,
        incomplete,
    })
}

fn answer_entry(client_id: &str, index: usize, entry: &Value) -> Result<ClientAnswer, LegacyError> {
    let field = |names: [&str; 2], label: &'static str| {
        names
            .iter()
            .find_map(|name| entry.get(*name).and_then(id_string))
            .ok_or_else(|| LegacyError::IncompleteAnswer {
                client_id: client_id.to_string(),
                index,
                field: label,
            })
    };

    let question_id = field(["question_id", "questionId"], "question id")?;
    let answer_id = field(["answer_id", "answerId"], "answer id")?;
    Ok(ClientAnswer::new(question_id, answer_id))
}

/// Accepts plain strings and Mongo extended JSON `{"$oid": "..."}`
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn age_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
