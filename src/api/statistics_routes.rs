//! Statistics routes
//!
//! - `GET /statistics`
//! - `GET /completed-surveys`
//! - `GET /surveys/:id/statistics`
//! - `GET /age-buckets`

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use crate::analytics::SurveyTally;
use crate::config::AgeBucket;
use crate::error::InsightsError;
use crate::model::SurveyId;
use crate::service::InsightsService;
use crate::statistics::StatisticsReport;

pub fn create_statistics_router(service: InsightsService) -> Router {
    Router::new()
        .route("/statistics", get(get_statistics))
        .route("/completed-surveys", get(get_completed_surveys))
        .route("/surveys/:survey_id/statistics", get(get_survey_statistics))
        .route("/age-buckets", get(get_age_buckets))
        .with_state(service)
}

async fn get_statistics(
    State(service): State<InsightsService>,
) -> Result<Json<StatisticsReport>, InsightsError> {
    service.statistics().await.map(Json)
}

async fn get_completed_surveys(
    State(service): State<InsightsService>,
) -> Result<Json<BTreeMap<SurveyId, bool>>, InsightsError> {
    service.completed_surveys().await.map(Json)
}

async fn get_survey_statistics(
    State(service): State<InsightsService>,
    Path(survey_id): Path<String>,
) -> Result<Json<SurveyTally>, InsightsError> {
    service
        .survey_statistics(&SurveyId::from(survey_id))
        .await
        .map(Json)
}

async fn get_age_buckets(State(service): State<InsightsService>) -> Json<Vec<AgeBucket>> {
    Json(service.scheme().buckets().to_vec())
}
