//! Aggregation passes over a [`Snapshot`](crate::snapshot::Snapshot)
//!
//! Each pass is a synchronous function of an immutable snapshot:
//!
//! - `tally` counts respondents per answer option
//! - `demographics` builds the age × gender matrix
//! - `recommend` ranks categories for one client
//! - `popularity` ranks categories across all clients

pub mod demographics;
pub mod popularity;
pub mod recommend;
pub mod tally;

pub use demographics::{BucketCounts, DemographicMatrix, DemographicRow, GenderCounts};
pub use popularity::{rank_categories, PopularCategory, PopularityRanking};
pub use recommend::{
    resolve_all, resolve_client, RankedCategory, Recommendation, SkipReason, SkippedAnswer,
};
pub use tally::{completed_surveys, AnswerCount, AnswerTallies, QuestionTally, SurveyTally, TallyCounts};
