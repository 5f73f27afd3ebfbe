//! Survey domain records
//!
//! Clients, surveys, questions, answers and categories as the engine sees
//! them. Every record is keyed by an opaque string identifier; each entity
//! gets its own newtype so a question id can never be looked up in the
//! answer collection by accident.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a survey respondent
    ClientId
);
string_id!(
    /// Identifier of a survey
    SurveyId
);
string_id!(
    /// Identifier of a survey question
    QuestionId
);
string_id!(
    /// Identifier of an answer option
    AnswerId
);
string_id!(
    /// Identifier of a product category
    CategoryId
);

// ============================================================================
// Client
// ============================================================================

/// Gender as tracked by the demographic statistics.
///
/// Anything other than `male`/`female` (including a missing value) is
/// `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Unspecified];

    /// Parse a recognised gender value, `None` for anything else
    pub fn parse(value: &str) -> Option<Gender> {
        match value.trim().to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "unspecified" | "" => Some(Gender::Unspecified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unspecified => "unspecified",
        }
    }

    /// Column index in demographic matrices
    pub fn index(&self) -> usize {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
            Gender::Unspecified => 2,
        }
    }
}

impl From<Option<String>> for Gender {
    fn from(value: Option<String>) -> Self {
        value
            .as_deref()
            .and_then(Gender::parse)
            .unwrap_or(Gender::Unspecified)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answered question on a client record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAnswer {
    #[serde(alias = "question_id")]
    pub question_id: QuestionId,
    #[serde(alias = "answer_id")]
    pub answer_id: AnswerId,
}

impl ClientAnswer {
    pub fn new(question_id: impl Into<QuestionId>, answer_id: impl Into<AnswerId>) -> Self {
        Self {
            question_id: question_id.into(),
            answer_id: answer_id.into(),
        }
    }
}

/// A customer who completed at least part of a survey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: ClientId,
    #[serde(default)]
    pub gender: Gender,
    /// Raw age; negative values are kept so they can be reported as malformed
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub answers: Vec<ClientAnswer>,
    #[serde(default, alias = "recommended_categories")]
    pub recommended_categories: Vec<CategoryId>,
}

impl Client {
    pub fn new(id: impl Into<ClientId>, gender: Gender, age: Option<i64>) -> Self {
        Self {
            id: id.into(),
            gender,
            age,
            answers: Vec::new(),
            recommended_categories: Vec::new(),
        }
    }

    pub fn with_answer(
        mut self,
        question_id: impl Into<QuestionId>,
        answer_id: impl Into<AnswerId>,
    ) -> Self {
        self.answers.push(ClientAnswer::new(question_id, answer_id));
        self
    }
}

// ============================================================================
// Reference records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: SurveyId,
    pub name: String,
    #[serde(default, alias = "question_ids", alias = "questions")]
    pub question_ids: Vec<QuestionId>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default, alias = "answer_ids", alias = "answers")]
    pub answer_ids: Vec<AnswerId>,
}

impl Question {
    pub fn offers(&self, answer_id: &AnswerId) -> bool {
        self.answer_ids.contains(answer_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: AnswerId,
    pub text: String,
    #[serde(default, alias = "category_id")]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub weight: Option<Decimal>,
}

impl Answer {
    /// Weight this answer contributes to its category.
    ///
    /// A categorised answer without a weight counts as 1; a negative weight
    /// is invalid and yields `None`.
    pub fn effective_weight(&self) -> Option<Decimal> {
        match self.weight {
            None => Some(Decimal::ONE),
            Some(w) if w.is_sign_negative() && !w.is_zero() => None,
            Some(w) => Some(w),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}
