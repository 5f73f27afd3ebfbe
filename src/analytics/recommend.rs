//! Per-client category recommendation
//!
//! A client's answers are resolved against the snapshot and each answer's
//! weight is added to its category's running total. Categories are then
//! ranked by total weight, highest first, with ties going to the lexically
//! smaller category id.
//!
//! Resolution never fails. Pairs that carry no usable signal are returned as
//! [`SkippedAnswer`]s alongside the ranking.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::model::{AnswerId, CategoryId, Client, ClientId, QuestionId};
use crate::snapshot::{Snapshot, Unresolved};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownQuestion,
    UnknownAnswer,
    AnswerNotInQuestion,
    /// The answer exists but maps to no category
    NoCategory,
    /// The answer's category is absent from the snapshot
    UnknownCategory,
    /// Negative weight
    InvalidWeight,
    /// The question was already answered earlier in the client's list
    DuplicateQuestion,
}

impl SkipReason {
    /// Whether the skip was caused by a reference to a missing record
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            SkipReason::UnknownQuestion
                | SkipReason::UnknownAnswer
                | SkipReason::AnswerNotInQuestion
                | SkipReason::UnknownCategory
        )
    }
}

impl From<Unresolved> for SkipReason {
    fn from(reason: Unresolved) -> Self {
        match reason {
            Unresolved::UnknownQuestion => SkipReason::UnknownQuestion,
            Unresolved::UnknownAnswer => SkipReason::UnknownAnswer,
            Unresolved::AnswerNotInQuestion => SkipReason::AnswerNotInQuestion,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::UnknownQuestion => "question not found",
            SkipReason::UnknownAnswer => "answer not found",
            SkipReason::AnswerNotInQuestion => "answer does not belong to question",
            SkipReason::NoCategory => "answer has no category",
            SkipReason::UnknownCategory => "category not found",
            SkipReason::InvalidWeight => "answer weight is negative",
            SkipReason::DuplicateQuestion => "question answered more than once",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAnswer {
    pub question_id: QuestionId,
    pub answer_id: AnswerId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCategory {
    pub category_id: CategoryId,
    pub weight: Decimal,
}

/// Ranked categories for one client plus the pairs that did not contribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub client_id: ClientId,
    pub categories: Vec<RankedCategory>,
    pub skipped: Vec<SkippedAnswer>,
}

impl Recommendation {
    pub fn category_ids(&self) -> Vec<CategoryId> {
        self.categories
            .iter()
            .map(|c| c.category_id.clone())
            .collect()
    }

    /// Skipped pairs that referenced a missing record
    pub fn unresolved_count(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.reason.is_unresolved())
            .count()
    }

    /// Overwrite the client's cached recommendation list
    pub fn apply_to(&self, client: &mut Client) {
        client.recommended_categories = self.category_ids();
    }
}

pub fn resolve_client(snapshot: &Snapshot, client: &Client) -> Recommendation {
    let mut totals: BTreeMap<CategoryId, Decimal> = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut answered: HashSet<&QuestionId> = HashSet::new();

    for pair in &client.answers {
        let skip = |reason: SkipReason| SkippedAnswer {
            question_id: pair.question_id.clone(),
            answer_id: pair.answer_id.clone(),
            reason,
        };

        let answer = match snapshot.resolve_pair(pair) {
            Ok((_, answer)) => answer,
            Err(reason) => {
                skipped.push(skip(reason.into()));
                continue;
            }
        };

        if !answered.insert(&pair.question_id) {
            skipped.push(skip(SkipReason::DuplicateQuestion));
            continue;
        }

        let Some(category_id) = &answer.category_id else {
            skipped.push(skip(SkipReason::NoCategory));
            continue;
        };
        if snapshot.category(category_id).is_none() {
            skipped.push(skip(SkipReason::UnknownCategory));
            continue;
        }
        let Some(weight) = answer.effective_weight() else {
            skipped.push(skip(SkipReason::InvalidWeight));
            continue;
        };

        // Saturates instead of overflowing; a saturated total still ranks first
        let total = totals.entry(category_id.clone()).or_insert(Decimal::ZERO);
        *total = total.checked_add(weight).unwrap_or_else(|| {
            debug!("Client {}: weight total for {} saturated", client.id, category_id);
            Decimal::MAX
        });
    }

    // BTreeMap iteration is already id-ascending; the stable sort keeps that
    // order among equal weights.
    let mut categories: Vec<RankedCategory> = totals
        .into_iter()
        .map(|(category_id, weight)| RankedCategory {
            category_id,
            weight,
        })
        .collect();
    categories.sort_by(|a, b| b.weight.cmp(&a.weight));

    if !skipped.is_empty() {
        debug!(
            "Client {}: {} answers skipped during resolution",
            client.id,
            skipped.len()
        );
    }

    Recommendation {
        client_id: client.id.clone(),
        categories,
        skipped,
    }
}

/// Resolve every client in the snapshot, in client id order
pub fn resolve_all(snapshot: &Snapshot) -> Vec<Recommendation> {
    snapshot
        .clients_sorted()
        .into_iter()
        .map(|client| resolve_client(snapshot, client))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::{answer, category, question, sample_snapshot};
    use crate::model::Gender;

    fn snapshot_with(answers: Vec<crate::model::Answer>, answer_ids: &[&str]) -> Snapshot {
        Snapshot::from_records(
            Vec::new(),
            Vec::new(),
            vec![question("q1", "Pick", answer_ids)],
            answers,
            vec![category("C1", "One"), category("C2", "Two")],
        )
    }

    fn client_answering(answer_ids: &[&str]) -> Client {
        // one question per answer so duplicates never interfere
        answer_ids
            .iter()
            .enumerate()
            .fold(Client::new("c1", Gender::Female, Some(30)), |c, (i, a)| {
                c.with_answer(format!("q{}", i + 1), *a)
            })
    }

    fn multi_question_snapshot(answers: Vec<crate::model::Answer>) -> Snapshot {
        let questions = answers
            .iter()
            .enumerate()
            .map(|(i, a)| question(&format!("q{}", i + 1), "Pick", &[a.id.as_str()]))
            .collect();
        Snapshot::from_records(
            Vec::new(),
            Vec::new(),
            questions,
            answers,
            vec![category("C1", "One"), category("C2", "Two")],
        )
    }

    #[test]
    fn test_weights_accumulate_per_category() {
        let snapshot = multi_question_snapshot(vec![
            answer("x", "x", Some("C1"), Some(2)),
            answer("y", "y", Some("C1"), Some(3)),
            answer("z", "z", Some("C2"), Some(4)),
        ]);
        let rec = resolve_client(&snapshot, &client_answering(&["x", "y", "z"]));

        assert_eq!(
            rec.category_ids(),
            vec![CategoryId::from("C1"), CategoryId::from("C2")]
        );
        assert_eq!(rec.categories[0].weight, Decimal::from(5));
        assert!(rec.skipped.is_empty());
    }

    #[test]
    fn test_running_total_beats_single_heavier_answer() {
        // 2 + 3 on C1 outweighs a single 4 on C2
        let snapshot = multi_question_snapshot(vec![
            answer("x", "x", Some("C1"), Some(2)),
            answer("y", "y", Some("C1"), Some(3)),
            answer("z", "z", Some("C2"), Some(4)),
        ]);
        let rec = resolve_client(&snapshot, &client_answering(&["z", "x", "y"]));

        assert_eq!(
            rec.category_ids(),
            vec![CategoryId::from("C1"), CategoryId::from("C2")]
        );
        assert_eq!(rec.categories[1].weight, Decimal::from(4));
    }

    #[test]
    fn test_weight_total_saturates_instead_of_overflowing() {
        let mut heavy = vec![
            answer("x", "x", Some("C1"), None),
            answer("y", "y", Some("C1"), None),
            answer("z", "z", Some("C2"), None),
        ];
        heavy[0].weight = Some(Decimal::MAX);
        heavy[1].weight = Some(Decimal::MAX);
        heavy[2].weight = Some(Decimal::MAX - Decimal::ONE);
        let snapshot = multi_question_snapshot(heavy);

        let rec = resolve_client(&snapshot, &client_answering(&["x", "y", "z"]));
        assert_eq!(
            rec.category_ids(),
            vec![CategoryId::from("C1"), CategoryId::from("C2")]
        );
        assert_eq!(rec.categories[0].weight, Decimal::MAX);
        assert!(rec.skipped.is_empty());
    }

    #[test]
    fn test_single_heavier_answer_wins() {
        let snapshot = multi_question_snapshot(vec![
            answer("x", "x", Some("C1"), Some(2)),
            answer("y", "y", Some("C1"), Some(1)),
            answer("z", "z", Some("C2"), Some(4)),
        ]);
        let rec = resolve_client(&snapshot, &client_answering(&["x", "y", "z"]));

        assert_eq!(
            rec.category_ids(),
            vec![CategoryId::from("C2"), CategoryId::from("C1")]
        );
    }

    #[test]
    fn test_tie_breaks_on_category_id() {
        let snapshot = Snapshot::from_records(
            Vec::new(),
            Vec::new(),
            vec![
                question("q1", "One", &["a1"]),
                question("q2", "Two", &["a2"]),
            ],
            vec![
                answer("a1", "one", Some("Woody"), Some(5)),
                answer("a2", "two", Some("Citrus"), Some(5)),
            ],
            vec![category("Woody", "Woody"), category("Citrus", "Citrus")],
        );
        let client = Client::new("c1", Gender::Male, None)
            .with_answer("q1", "a1")
            .with_answer("q2", "a2");

        let rec = resolve_client(&snapshot, &client);
        assert_eq!(
            rec.category_ids(),
            vec![CategoryId::from("Citrus"), CategoryId::from("Woody")]
        );
    }

    #[test]
    fn test_no_answers_gives_empty_list() {
        let snapshot = sample_snapshot();
        let bo = snapshot.client(&ClientId::from("c-bo")).unwrap();
        let rec = resolve_client(&snapshot, bo);
        assert!(rec.categories.is_empty());
        assert!(rec.skipped.is_empty());
    }

    #[test]
    fn test_deleted_question_is_skipped() {
        let mut snapshot = sample_snapshot();
        snapshot.questions.remove(&QuestionId::from("q-season"));
        let ana = snapshot.client(&ClientId::from("c-ana")).unwrap().clone();

        let rec = resolve_client(&snapshot, &ana);
        assert_eq!(rec.unresolved_count(), 1);
        assert_eq!(rec.skipped[0].reason, SkipReason::UnknownQuestion);
        assert_eq!(rec.category_ids(), vec![CategoryId::from("citrus")]);
        assert_eq!(rec.categories[0].weight, Decimal::from(3));
    }

    #[test]
    fn test_skip_reasons() {
        let snapshot = snapshot_with(
            vec![
                answer("plain", "plain", None, None),
                answer("ghost", "ghost", Some("C9"), Some(1)),
                answer("neg", "neg", Some("C1"), Some(-2)),
                answer("stray", "stray", Some("C1"), Some(1)),
            ],
            &["plain", "ghost", "neg"],
        );
        let reasons = |answer_id: &str| {
            let client = Client::new("c1", Gender::Female, None).with_answer("q1", answer_id);
            resolve_client(&snapshot, &client).skipped[0].reason
        };

        assert_eq!(reasons("plain"), SkipReason::NoCategory);
        assert_eq!(reasons("ghost"), SkipReason::UnknownCategory);
        assert_eq!(reasons("neg"), SkipReason::InvalidWeight);
        assert_eq!(reasons("stray"), SkipReason::AnswerNotInQuestion);
        assert_eq!(reasons("missing"), SkipReason::UnknownAnswer);
        assert!(!SkipReason::NoCategory.is_unresolved());
        assert!(SkipReason::UnknownCategory.is_unresolved());
    }

    #[test]
    fn test_only_first_answer_per_question_counts() {
        let snapshot = snapshot_with(
            vec![
                answer("a", "a", Some("C1"), Some(1)),
                answer("b", "b", Some("C2"), Some(9)),
            ],
            &["a", "b"],
        );
        let client = Client::new("c1", Gender::Male, Some(40))
            .with_answer("q1", "a")
            .with_answer("q1", "b");

        let rec = resolve_client(&snapshot, &client);
        assert_eq!(rec.category_ids(), vec![CategoryId::from("C1")]);
        assert_eq!(rec.skipped[0].reason, SkipReason::DuplicateQuestion);
        assert_eq!(rec.unresolved_count(), 0);
    }

    #[test]
    fn test_missing_weight_counts_as_one() {
        let snapshot = snapshot_with(vec![answer("a", "a", Some("C1"), None)], &["a"]);
        let client = Client::new("c1", Gender::Male, None).with_answer("q1", "a");
        let rec = resolve_client(&snapshot, &client);
        assert_eq!(rec.categories[0].weight, Decimal::ONE);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let snapshot = sample_snapshot();
        let first = serde_json::to_vec(&resolve_all(&snapshot)).unwrap();
        let second = serde_json::to_vec(&resolve_all(&snapshot)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_to_overwrites_cache() {
        let snapshot = sample_snapshot();
        let mut cy = snapshot.client(&ClientId::from("c-cy")).unwrap().clone();
        cy.recommended_categories = vec![CategoryId::from("floral")];

        resolve_client(&snapshot, &cy.clone()).apply_to(&mut cy);
        assert_eq!(
            cy.recommended_categories,
            vec![CategoryId::from("citrus"), CategoryId::from("woody")]
        );
    }
}
