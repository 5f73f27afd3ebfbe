//! Answer tallies
//!
//! Counts respondents per answer option. A client contributes at most one
//! count per question: the first pair that resolves. Pairs that do not
//! resolve are counted as unresolved against their question (or as orphaned
//! when the question itself is gone), so every client-answer pair is
//! accounted for exactly once.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::model::{AnswerId, Client, QuestionId, SurveyId};
use crate::snapshot::{Snapshot, Unresolved};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerCount {
    pub id: AnswerId,
    pub text: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionTally {
    pub id: QuestionId,
    pub text: String,
    /// Every option of the question in its declared order, zero counts included
    pub answers: Vec<AnswerCount>,
    /// Pairs naming this question whose answer did not resolve
    pub unresolved: u64,
}

impl QuestionTally {
    /// Clients counted for this question
    pub fn respondents(&self) -> u64 {
        self.answers.iter().map(|a| a.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyTally {
    pub id: SurveyId,
    pub name: String,
    pub active: bool,
    /// Questions in the survey's declared order
    pub questions: Vec<QuestionTally>,
    /// Listed question ids absent from the snapshot
    pub missing_questions: Vec<QuestionId>,
}

/// Raw counters from a pass over some clients.
///
/// Counters from disjoint client sets can be merged in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyCounts {
    counts: HashMap<(QuestionId, AnswerId), u64>,
    unresolved: HashMap<QuestionId, u64>,
    orphaned: HashMap<QuestionId, u64>,
    duplicates: u64,
}

impl TallyCounts {
    pub fn record_client(&mut self, snapshot: &Snapshot, client: &Client) {
        let mut counted: HashSet<&QuestionId> = HashSet::new();

        for pair in &client.answers {
            match snapshot.resolve_pair(pair) {
                Ok(_) => {
                    if counted.insert(&pair.question_id) {
                        *self
                            .counts
                            .entry((pair.question_id.clone(), pair.answer_id.clone()))
                            .or_insert(0) += 1;
                    } else {
                        self.duplicates += 1;
                    }
                }
                Err(Unresolved::UnknownQuestion) => {
                    *self.orphaned.entry(pair.question_id.clone()).or_insert(0) += 1;
                }
                Err(Unresolved::UnknownAnswer | Unresolved::AnswerNotInQuestion) => {
                    *self.unresolved.entry(pair.question_id.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn merge(&mut self, other: TallyCounts) {
        for (key, count) in other.counts {
            *self.counts.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.unresolved {
            *self.unresolved.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.orphaned {
            *self.orphaned.entry(key).or_insert(0) += count;
        }
        self.duplicates += other.duplicates;
    }
}

/// Per-question tallies for a whole snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTallies {
    questions: HashMap<QuestionId, QuestionTally>,
    /// Pairs naming questions absent from the snapshot, by question id
    pub orphaned: BTreeMap<QuestionId, u64>,
    pub duplicate_pairs: u64,
}

impl AnswerTallies {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut counts = TallyCounts::default();
        for client in snapshot.clients.values() {
            counts.record_client(snapshot, client);
        }
        Self::from_counts(snapshot, counts)
    }

    pub fn from_counts(snapshot: &Snapshot, counts: TallyCounts) -> Self {
        let questions = snapshot
            .questions
            .values()
            .map(|question| {
                let mut seen = HashSet::new();
                let answers = question
                    .answer_ids
                    .iter()
                    .filter(|id| seen.insert(*id))
                    .filter_map(|id| snapshot.answer(id))
                    .map(|answer| AnswerCount {
                        id: answer.id.clone(),
                        text: answer.text.clone(),
                        count: counts
                            .counts
                            .get(&(question.id.clone(), answer.id.clone()))
                            .copied()
                            .unwrap_or(0),
                    })
                    .collect();

                let tally = QuestionTally {
                    id: question.id.clone(),
                    text: question.text.clone(),
                    answers,
                    unresolved: counts.unresolved.get(&question.id).copied().unwrap_or(0),
                };
                (question.id.clone(), tally)
            })
            .collect();

        Self {
            questions,
            orphaned: counts.orphaned.into_iter().collect(),
            duplicate_pairs: counts.duplicates,
        }
    }

    pub fn question(&self, id: &QuestionId) -> Option<&QuestionTally> {
        self.questions.get(id)
    }

    /// All question tallies in question id order
    pub fn questions_sorted(&self) -> Vec<&QuestionTally> {
        let mut tallies: Vec<&QuestionTally> = self.questions.values().collect();
        tallies.sort_by(|a, b| a.id.cmp(&b.id));
        tallies
    }

    /// Unresolved pairs across all questions, orphaned ones included
    pub fn unresolved_pairs(&self) -> u64 {
        let per_question: u64 = self.questions.values().map(|q| q.unresolved).sum();
        per_question + self.orphaned.values().sum::<u64>()
    }

    /// The survey's questions with tallies, in declared order
    pub fn for_survey(&self, snapshot: &Snapshot, survey_id: &SurveyId) -> Option<SurveyTally> {
        let survey = snapshot.survey(survey_id)?;
        let mut seen = HashSet::new();
        let mut questions = Vec::new();
        let mut missing_questions = Vec::new();

        for question_id in &survey.question_ids {
            if !seen.insert(question_id) {
                continue;
            }
            match self.questions.get(question_id) {
                Some(tally) => questions.push(tally.clone()),
                None => missing_questions.push(question_id.clone()),
            }
        }

        Some(SurveyTally {
            id: survey.id.clone(),
            name: survey.name.clone(),
            active: survey.active,
            questions,
            missing_questions,
        })
    }
}

/// Whether each survey has at least one respondent with a resolvable answer
/// to one of its questions
pub fn completed_surveys(snapshot: &Snapshot) -> BTreeMap<SurveyId, bool> {
    let mut completed: BTreeMap<SurveyId, bool> = snapshot
        .surveys
        .keys()
        .map(|id| (id.clone(), false))
        .collect();

    for client in snapshot.clients.values() {
        for pair in &client.answers {
            if snapshot.resolve_pair(pair).is_err() {
                continue;
            }
            for survey_id in snapshot.surveys_for_question(&pair.question_id) {
                if let Some(flag) = completed.get_mut(survey_id) {
                    *flag = true;
                }
            }
        }
    }

    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::sample_snapshot;
    use crate::model::{ClientAnswer, Gender};

    #[test]
    fn test_counts_cover_every_option() {
        let snapshot = sample_snapshot();
        let tallies = AnswerTallies::build(&snapshot);

        let scent = tallies.question(&QuestionId::from("q-scent")).unwrap();
        let counts: Vec<(&str, u64)> = scent
            .answers
            .iter()
            .map(|a| (a.id.as_str(), a.count))
            .collect();
        assert_eq!(
            counts,
            vec![("a-fresh", 2), ("a-warm", 1), ("a-sweet", 0)]
        );
    }

    #[test]
    fn test_sum_matches_resolvable_respondents() {
        let snapshot = sample_snapshot();
        let tallies = AnswerTallies::build(&snapshot);

        for tally in tallies.questions_sorted() {
            let expected = snapshot
                .clients
                .values()
                .filter(|c| {
                    c.answers.iter().any(|p| {
                        p.question_id == tally.id && snapshot.resolve_pair(p).is_ok()
                    })
                })
                .count() as u64;
            assert_eq!(tally.respondents(), expected, "question {}", tally.id);
        }
    }

    #[test]
    fn test_unresolved_and_orphaned_pairs_are_reported() {
        let mut snapshot = sample_snapshot();
        let client = crate::model::Client::new("c-odd", Gender::Female, Some(33))
            .with_answer("q-scent", "a-missing")
            .with_answer("q-deleted", "a-fresh")
            .with_answer("q-scent", "a-fresh")
            .with_answer("q-scent", "a-warm");
        snapshot.clients.insert(client.id.clone(), client);

        let tallies = AnswerTallies::build(&snapshot);
        let scent = tallies.question(&QuestionId::from("q-scent")).unwrap();
        assert_eq!(scent.unresolved, 1);
        assert_eq!(scent.respondents(), 4);
        assert_eq!(tallies.orphaned.get(&QuestionId::from("q-deleted")), Some(&1));
        assert_eq!(tallies.duplicate_pairs, 1);
        assert_eq!(tallies.unresolved_pairs(), 2);
    }

    #[test]
    fn test_merge_is_associative_over_clients() {
        let snapshot = sample_snapshot();
        let clients = snapshot.clients_sorted();
        let (left, right) = clients.split_at(clients.len() / 2);

        let mut a = TallyCounts::default();
        left.iter().for_each(|c| a.record_client(&snapshot, c));
        let mut b = TallyCounts::default();
        right.iter().for_each(|c| b.record_client(&snapshot, c));
        b.merge(a);

        assert_eq!(
            AnswerTallies::from_counts(&snapshot, b),
            AnswerTallies::build(&snapshot)
        );
    }

    #[test]
    fn test_survey_tally_keeps_declared_order() {
        let mut snapshot = sample_snapshot();
        snapshot
            .surveys
            .get_mut(&SurveyId::from("s-fragrance"))
            .unwrap()
            .question_ids
            .push(QuestionId::from("q-gone"));

        let tallies = AnswerTallies::build(&snapshot);
        let survey = tallies
            .for_survey(&snapshot, &SurveyId::from("s-fragrance"))
            .unwrap();
        let ids: Vec<&str> = survey.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q-scent", "q-season"]);
        assert_eq!(survey.missing_questions, vec![QuestionId::from("q-gone")]);
        assert!(tallies.for_survey(&snapshot, &SurveyId::from("nope")).is_none());
    }

    #[test]
    fn test_completed_surveys() {
        let mut snapshot = sample_snapshot();
        let completed = completed_surveys(&snapshot);
        assert_eq!(completed.get(&SurveyId::from("s-fragrance")), Some(&true));
        assert_eq!(completed.get(&SurveyId::from("s-skin")), Some(&false));

        let client = snapshot
            .clients
            .get_mut(&crate::model::ClientId::from("c-ana"))
            .unwrap();
        client.answers.push(ClientAnswer::new("q-skin", "a-unknown"));
        assert_eq!(
            completed_surveys(&snapshot).get(&SurveyId::from("s-skin")),
            Some(&false)
        );
    }
}
