//! Age × gender breakdown of respondents
//!
//! Buckets come from the shared [`AgeBucketScheme`]. Every client lands in
//! exactly one cell: a configured bucket or the unknown-age row.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::config::{AgeBucketScheme, AgeClass};
use crate::model::Gender;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenderCounts {
    pub male: u64,
    pub female: u64,
    pub unspecified: u64,
}

impl GenderCounts {
    fn add(&mut self, gender: Gender) {
        match gender {
            Gender::Male => self.male += 1,
            Gender::Female => self.female += 1,
            Gender::Unspecified => self.unspecified += 1,
        }
    }

    pub fn get(&self, gender: Gender) -> u64 {
        match gender {
            Gender::Male => self.male,
            Gender::Female => self.female,
            Gender::Unspecified => self.unspecified,
        }
    }

    pub fn total(&self) -> u64 {
        self.male + self.female + self.unspecified
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemographicRow {
    pub label: String,
    #[serde(flatten)]
    pub counts: GenderCounts,
}

/// Bucket label -> count for one gender, serialized as an ordered JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketCounts(pub Vec<(String, u64)>);

impl Serialize for BucketCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, count) in &self.0 {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemographicMatrix {
    scheme: AgeBucketScheme,
    rows: Vec<GenderCounts>,
    pub unknown_age: GenderCounts,
    /// Clients with no age at all
    pub missing_age: u64,
    /// Clients with a negative age or one the scheme does not cover
    pub malformed_age: u64,
}

impl DemographicMatrix {
    pub fn build(snapshot: &Snapshot, scheme: &AgeBucketScheme) -> Self {
        let mut rows = vec![GenderCounts::default(); scheme.len()];
        let mut unknown_age = GenderCounts::default();
        let mut missing_age = 0;
        let mut malformed_age = 0;

        for client in snapshot.clients.values() {
            match scheme.classify(client.age) {
                AgeClass::Bucket(index) => rows[index].add(client.gender),
                AgeClass::Unknown => {
                    unknown_age.add(client.gender);
                    if client.age.is_none() {
                        missing_age += 1;
                    } else {
                        malformed_age += 1;
                    }
                }
            }
        }

        Self {
            scheme: scheme.clone(),
            rows,
            unknown_age,
            missing_age,
            malformed_age,
        }
    }

    pub fn scheme(&self) -> &AgeBucketScheme {
        &self.scheme
    }

    pub fn count(&self, bucket: usize, gender: Gender) -> u64 {
        self.rows.get(bucket).map_or(0, |row| row.get(gender))
    }

    /// Every client counted, unknown ages included
    pub fn total(&self) -> u64 {
        self.rows.iter().map(GenderCounts::total).sum::<u64>() + self.unknown_age.total()
    }

    /// Bucket with the highest count for the gender; ties go to the lower
    /// index. `None` when no client of that gender has a known age.
    pub fn most_common_bucket(&self, gender: Gender) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (index, row) in self.rows.iter().enumerate() {
            let count = row.get(gender);
            if count == 0 {
                continue;
            }
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((index, count));
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn most_common_label(&self, gender: Gender) -> Option<&str> {
        self.most_common_bucket(gender)
            .and_then(|index| self.scheme.label(index))
    }

    /// Count per configured bucket for one gender, in bucket order
    pub fn bucket_counts(&self, gender: Gender) -> BucketCounts {
        BucketCounts(
            self.scheme
                .buckets()
                .iter()
                .zip(&self.rows)
                .map(|(bucket, row)| (bucket.label.clone(), row.get(gender)))
                .collect(),
        )
    }

    /// Configured buckets followed by the unknown-age row
    pub fn rows(&self) -> Vec<DemographicRow> {
        self.scheme
            .buckets()
            .iter()
            .zip(&self.rows)
            .map(|(bucket, counts)| DemographicRow {
                label: bucket.label.clone(),
                counts: *counts,
            })
            .chain(std::iter::once(DemographicRow {
                label: "Unknown".to_string(),
                counts: self.unknown_age,
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::sample_snapshot;
    use crate::config::AgeBucket;
    use crate::model::Client;

    #[test]
    fn test_young_male_without_answers_lands_in_lowest_bucket() {
        let snapshot = sample_snapshot();
        let matrix = DemographicMatrix::build(&snapshot, &AgeBucketScheme::default());

        // c-bo is male, 5 years old
        assert_eq!(matrix.count(0, Gender::Male), 1);
    }

    #[test]
    fn test_counts_sum_to_client_total() {
        let mut snapshot = sample_snapshot();
        for (id, age) in [("x1", Some(-1)), ("x2", None), ("x3", Some(200))] {
            let client = Client::new(id, Gender::Female, age);
            snapshot.clients.insert(client.id.clone(), client);
        }

        let matrix = DemographicMatrix::build(&snapshot, &AgeBucketScheme::default());
        assert_eq!(matrix.total(), snapshot.clients.len() as u64);
        // c-di has no age, x2 has no age
        assert_eq!(matrix.missing_age, 2);
        // 200 still falls in the open-ended 65+ bucket
        assert_eq!(matrix.malformed_age, 1);
    }

    #[test]
    fn test_most_common_prefers_lower_bucket_on_tie() {
        let snapshot = sample_snapshot();
        let matrix = DemographicMatrix::build(&snapshot, &AgeBucketScheme::default());

        // male: Under 12 and 30-40 each have one client
        assert_eq!(matrix.most_common_bucket(Gender::Male), Some(0));
        assert_eq!(matrix.most_common_label(Gender::Male), Some("Under 12"));
        // female: 18-30 and 65+ each have one client
        assert_eq!(matrix.most_common_label(Gender::Female), Some("18-30"));
        // the only unspecified client has no age
        assert_eq!(matrix.most_common_bucket(Gender::Unspecified), None);
    }

    #[test]
    fn test_custom_scheme() {
        let scheme = AgeBucketScheme::new(vec![
            AgeBucket::new("kids", 0, Some(18)),
            AgeBucket::new("adults", 18, None),
        ])
        .unwrap();
        let matrix = DemographicMatrix::build(&sample_snapshot(), &scheme);

        assert_eq!(matrix.count(0, Gender::Male), 1);
        assert_eq!(matrix.count(1, Gender::Male), 1);
        assert_eq!(matrix.count(1, Gender::Female), 2);
        assert_eq!(matrix.rows().len(), 3);
    }

    #[test]
    fn test_bucket_counts_serialize_in_bucket_order() {
        let matrix = DemographicMatrix::build(&sample_snapshot(), &AgeBucketScheme::default());
        let json = serde_json::to_string(&matrix.bucket_counts(Gender::Male)).unwrap();
        assert_eq!(
            json,
            r#"{"Under 12":1,"12-18":0,"18-30":0,"30-40":1,"40-65":0,"65+":0}"#
        );
    }
}
