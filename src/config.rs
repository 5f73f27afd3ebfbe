//! Age bucket scheme and service configuration
//!
//! The bucket scheme is the single source of age ranges for both the
//! demographic statistics and the client list filter. It is loaded from YAML
//! and validated once; call sites only ever ask it to classify an age.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;

/// A half-open age range `[min_age, max_age_exclusive)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeBucket {
    pub label: String,
    #[serde(alias = "min_age")]
    pub min_age: u32,
    /// `None` means open-ended; only allowed on the last bucket
    #[serde(default, alias = "max_age_exclusive")]
    pub max_age_exclusive: Option<u32>,
}

impl AgeBucket {
    pub fn new(label: &str, min_age: u32, max_age_exclusive: Option<u32>) -> Self {
        Self {
            label: label.to_string(),
            min_age,
            max_age_exclusive,
        }
    }

    pub fn contains(&self, age: u32) -> bool {
        age >= self.min_age && self.max_age_exclusive.map_or(true, |max| age < max)
    }
}

/// Where an age lands in the scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeClass {
    Bucket(usize),
    /// Age is absent, negative, or beyond the last closed bucket
    Unknown,
}

/// Root configuration for age buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBucketScheme {
    buckets: Vec<AgeBucket>,
}

impl Default for AgeBucketScheme {
    /// The six ranges used by the statistics dashboard
    fn default() -> Self {
        Self {
            buckets: vec![
                AgeBucket::new("Under 12", 0, Some(12)),
                AgeBucket::new("12-18", 12, Some(18)),
                AgeBucket::new("18-30", 18, Some(30)),
                AgeBucket::new("30-40", 30, Some(40)),
                AgeBucket::new("40-65", 40, Some(65)),
                AgeBucket::new("65+", 65, None),
            ],
        }
    }
}

impl AgeBucketScheme {
    pub fn new(buckets: Vec<AgeBucket>) -> Result<Self, ConfigError> {
        let scheme = Self { buckets };
        scheme.validate()?;
        Ok(scheme)
    }

    /// Load from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::load_from_str(&content)
    }

    /// Load from a YAML string
    pub fn load_from_str(yaml: &str) -> Result<Self, ConfigError> {
        let scheme: AgeBucketScheme =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        scheme.validate()?;
        Ok(scheme)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidBuckets(msg));

        let Some(first) = self.buckets.first() else {
            return invalid("at least one bucket is required".to_string());
        };
        if first.min_age != 0 {
            return invalid(format!(
                "first bucket '{}' must start at age 0, starts at {}",
                first.label, first.min_age
            ));
        }

        let mut labels = std::collections::HashSet::new();
        for (index, bucket) in self.buckets.iter().enumerate() {
            if bucket.label.trim().is_empty() {
                return invalid(format!("bucket {} has an empty label", index));
            }
            if !labels.insert(bucket.label.as_str()) {
                return invalid(format!("duplicate bucket label '{}'", bucket.label));
            }

            let is_last = index + 1 == self.buckets.len();
            match bucket.max_age_exclusive {
                Some(max) if max <= bucket.min_age => {
                    return invalid(format!(
                        "bucket '{}' is empty: {}..{}",
                        bucket.label, bucket.min_age, max
                    ));
                }
                None if !is_last => {
                    return invalid(format!(
                        "only the last bucket may be open-ended, '{}' is not last",
                        bucket.label
                    ));
                }
                _ => {}
            }

            if let Some(next) = self.buckets.get(index + 1) {
                if bucket.max_age_exclusive != Some(next.min_age) {
                    return invalid(format!(
                        "bucket '{}' must end where '{}' starts ({})",
                        bucket.label, next.label, next.min_age
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn buckets(&self) -> &[AgeBucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.buckets.get(index).map(|b| b.label.as_str())
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.buckets.iter().position(|b| b.label == label)
    }

    /// Classify a raw client age
    pub fn classify(&self, age: Option<i64>) -> AgeClass {
        let Some(age) = age.and_then(|a| u32::try_from(a).ok()) else {
            return AgeClass::Unknown;
        };

        self.buckets
            .iter()
            .position(|b| b.contains(age))
            .map_or(AgeClass::Unknown, AgeClass::Bucket)
    }

    /// Bucket label for a raw age, `None` when the age is unknown
    pub fn label_for(&self, age: Option<i64>) -> Option<&str> {
        match self.classify(age) {
            AgeClass::Bucket(index) => self.label(index),
            AgeClass::Unknown => None,
        }
    }
}

// ============================================================================
// Service configuration
// ============================================================================

/// Runtime configuration for the HTTP service, read from the environment
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub age_buckets_path: Option<PathBuf>,
    pub seed_path: Option<PathBuf>,
    pub database_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            age_buckets_path: None,
            seed_path: None,
            database_url: None,
        }
    }
}

impl ServiceConfig {
    /// Read `PORT`, `AGE_BUCKETS_PATH`, `SEED_PATH` and `DATABASE_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(value) => value.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT",
                reason: e.to_string(),
            })?,
            Err(_) => {
                info!("PORT not set, using default: 3000");
                3000
            }
        };

        Ok(Self {
            port,
            age_buckets_path: std::env::var("AGE_BUCKETS_PATH").ok().map(PathBuf::from),
            seed_path: std::env::var("SEED_PATH").ok().map(PathBuf::from),
            database_url: std::env::var("DATABASE_URL").ok(),
        })
    }

    /// Load the configured bucket scheme, or the built-in default
    pub fn age_buckets(&self) -> Result<AgeBucketScheme, ConfigError> {
        match &self.age_buckets_path {
            Some(path) => {
                let scheme = AgeBucketScheme::load_from_file(path)?;
                info!(
                    "Loaded {} age buckets from {}",
                    scheme.len(),
                    path.display()
                );
                Ok(scheme)
            }
            None => {
                warn!("AGE_BUCKETS_PATH not set, using built-in age buckets");
                Ok(AgeBucketScheme::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_scheme_is_valid() {
        let scheme = AgeBucketScheme::default();
        assert!(scheme.validate().is_ok());
        assert_eq!(scheme.len(), 6);
    }

    #[test]
    fn test_classify_edges() {
        let scheme = AgeBucketScheme::default();
        assert_eq!(scheme.classify(Some(0)), AgeClass::Bucket(0));
        assert_eq!(scheme.classify(Some(5)), AgeClass::Bucket(0));
        assert_eq!(scheme.classify(Some(12)), AgeClass::Bucket(1));
        assert_eq!(scheme.classify(Some(29)), AgeClass::Bucket(2));
        assert_eq!(scheme.classify(Some(65)), AgeClass::Bucket(5));
        assert_eq!(scheme.classify(Some(120)), AgeClass::Bucket(5));
        assert_eq!(scheme.classify(Some(-3)), AgeClass::Unknown);
        assert_eq!(scheme.classify(None), AgeClass::Unknown);
    }

    #[test]
    fn test_closed_scheme_leaves_old_ages_unknown() {
        let scheme = AgeBucketScheme::new(vec![
            AgeBucket::new("young", 0, Some(30)),
            AgeBucket::new("older", 30, Some(60)),
        ])
        .unwrap();
        assert_eq!(scheme.classify(Some(59)), AgeClass::Bucket(1));
        assert_eq!(scheme.classify(Some(60)), AgeClass::Unknown);
    }

    #[test]
    fn test_load_from_str() {
        let yaml = r#"
buckets:
  - label: Under 18
    minAge: 0
    maxAgeExclusive: 18
  - label: 18-24
    minAge: 18
    maxAgeExclusive: 25
  - label: 25+
    minAge: 25
"#;
        let scheme = AgeBucketScheme::load_from_str(yaml).unwrap();
        assert_eq!(scheme.len(), 3);
        assert_eq!(scheme.label_for(Some(20)), Some("18-24"));
        assert_eq!(scheme.index_of("25+"), Some(2));
    }

    #[test]
    fn test_rejects_gaps_and_open_middle() {
        let gap = AgeBucketScheme::new(vec![
            AgeBucket::new("a", 0, Some(10)),
            AgeBucket::new("b", 12, None),
        ]);
        assert!(matches!(gap, Err(ConfigError::InvalidBuckets(_))));

        let open_middle = AgeBucketScheme::new(vec![
            AgeBucket::new("a", 0, None),
            AgeBucket::new("b", 12, None),
        ]);
        assert!(matches!(open_middle, Err(ConfigError::InvalidBuckets(_))));

        let late_start = AgeBucketScheme::new(vec![AgeBucket::new("a", 1, None)]);
        assert!(late_start.is_err());

        assert!(AgeBucketScheme::new(Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let dup = AgeBucketScheme::new(vec![
            AgeBucket::new("same", 0, Some(10)),
            AgeBucket::new("same", 10, None),
        ]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "buckets:\n  - label: all\n    minAge: 0\n"
        )
        .unwrap();

        let scheme = AgeBucketScheme::load_from_file(file.path()).unwrap();
        assert_eq!(scheme.label_for(Some(99)), Some("all"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = AgeBucketScheme::load_from_file(Path::new("/nonexistent/buckets.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
