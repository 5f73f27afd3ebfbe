//! Statistics report served by `GET /statistics`
//!
//! Built from one snapshot: answer tallies, the age × gender matrix and the
//! category popularity ranking. Popularity is computed from freshly resolved
//! recommendations held in memory; nothing is written back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::analytics::{
    rank_categories, resolve_all, AnswerTallies, BucketCounts, DemographicMatrix, DemographicRow,
    PopularCategory, QuestionTally,
};
use crate::config::AgeBucketScheme;
use crate::model::{CategoryId, Gender, QuestionId};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Serialize)]
pub struct MostCommonAgeRange {
    pub male: BucketCounts,
    pub female: BucketCounts,
}

/// Label of the most common bucket per gender
#[derive(Debug, Clone, Serialize)]
pub struct PeakAgeRange {
    pub male: Option<String>,
    pub female: Option<String>,
    pub unspecified: Option<String>,
}

/// Counts of records that were skipped or rerouted while building the report
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub clients: u64,
    pub unresolved_answers: u64,
    pub orphaned_questions: BTreeMap<QuestionId, u64>,
    pub duplicate_answers: u64,
    pub skipped_recommendation_answers: u64,
    pub unknown_categories: BTreeMap<CategoryId, u64>,
    pub missing_age: u64,
    pub malformed_age: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub questions: Vec<QuestionTally>,
    pub most_common_age_range: MostCommonAgeRange,
    pub peak_age_range: PeakAgeRange,
    pub age_distribution: Vec<DemographicRow>,
    pub popular_categories: Vec<PopularCategory>,
    pub diagnostics: Diagnostics,
    pub generated_at: DateTime<Utc>,
}

impl StatisticsReport {
    pub fn build(snapshot: &Snapshot, scheme: &AgeBucketScheme) -> Self {
        let tallies = AnswerTallies::build(snapshot);
        let matrix = DemographicMatrix::build(snapshot, scheme);

        let recommendations = resolve_all(snapshot);
        let lists: Vec<_> = recommendations
            .iter()
            .map(|r| (&r.client_id, r.category_ids()))
            .collect();
        let ranking = rank_categories(snapshot, lists.iter().map(|(id, c)| (*id, c.as_slice())));

        let peak = |gender| matrix.most_common_label(gender).map(str::to_string);

        let diagnostics = Diagnostics {
            clients: snapshot.clients.len() as u64,
            unresolved_answers: tallies.unresolved_pairs(),
            orphaned_questions: tallies.orphaned.clone(),
            duplicate_answers: tallies.duplicate_pairs,
            skipped_recommendation_answers: recommendations
                .iter()
                .map(|r| r.skipped.len() as u64)
                .sum(),
            unknown_categories: ranking.unresolved,
            missing_age: matrix.missing_age,
            malformed_age: matrix.malformed_age,
        };

        info!(
            "Built statistics for {} clients ({} unresolved answers, {} unknown ages)",
            diagnostics.clients,
            diagnostics.unresolved_answers,
            diagnostics.missing_age + diagnostics.malformed_age
        );

        Self {
            questions: tallies.questions_sorted().into_iter().cloned().collect(),
            most_common_age_range: MostCommonAgeRange {
                male: matrix.bucket_counts(Gender::Male),
                female: matrix.bucket_counts(Gender::Female),
            },
            peak_age_range: PeakAgeRange {
                male: peak(Gender::Male),
                female: peak(Gender::Female),
                unspecified: peak(Gender::Unspecified),
            },
            age_distribution: matrix.rows(),
            popular_categories: ranking.categories,
            diagnostics,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::sample_snapshot;
    use crate::model::ClientId;

    #[test]
    fn test_report_shape() {
        let report = StatisticsReport::build(&sample_snapshot(), &AgeBucketScheme::default());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["questions"].as_array().unwrap().len(), 3);
        assert_eq!(json["questions"][0]["id"], "q-scent");
        assert_eq!(json["questions"][0]["answers"][0]["count"], 2);
        assert_eq!(json["mostCommonAgeRange"]["male"]["Under 12"], 1);
        assert_eq!(json["mostCommonAgeRange"]["female"]["65+"], 1);
        assert_eq!(json["peakAgeRange"]["female"], "18-30");
        assert!(json["peakAgeRange"]["unspecified"].is_null());
        assert_eq!(json["popularCategories"][0]["name"], "Citrus");
        assert_eq!(json["popularCategories"][0]["appearances"], 3);
        assert_eq!(json["ageDistribution"].as_array().unwrap().len(), 7);
        assert!(json["generatedAt"].is_string());
    }

    #[test]
    fn test_report_ignores_stale_cache() {
        let mut snapshot = sample_snapshot();
        snapshot
            .clients
            .get_mut(&ClientId::from("c-bo"))
            .unwrap()
            .recommended_categories = vec![CategoryId::from("floral")];

        let report = StatisticsReport::build(&snapshot, &AgeBucketScheme::default());
        assert!(report
            .popular_categories
            .iter()
            .all(|c| c.id.as_str() != "floral"));
        // the snapshot itself is untouched
        assert_eq!(
            snapshot.clients[&ClientId::from("c-bo")].recommended_categories,
            vec![CategoryId::from("floral")]
        );
    }

    #[test]
    fn test_diagnostics_count_deleted_question() {
        let mut snapshot = sample_snapshot();
        snapshot.questions.remove(&QuestionId::from("q-season"));

        let report = StatisticsReport::build(&snapshot, &AgeBucketScheme::default());
        // four clients answered q-season
        assert_eq!(
            report.diagnostics.orphaned_questions.get(&QuestionId::from("q-season")),
            Some(&4)
        );
        assert_eq!(report.diagnostics.skipped_recommendation_answers, 4);
        assert_eq!(report.diagnostics.missing_age, 1);
    }
}
