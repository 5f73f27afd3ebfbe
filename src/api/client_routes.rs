//! Client routes
//!
//! - `GET  /clients?survey=&gender=&ageGroup=`
//! - `GET  /clients/:id/answers`
//! - `POST /clients/:id/recommendations` recomputes and saves one client
//! - `POST /recommendations/recompute` recomputes and saves everyone

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::analytics::Recommendation;
use crate::clients::{AnswerSheet, ClientFilter, ClientQuery, ClientSummary};
use crate::error::InsightsError;
use crate::model::ClientId;
use crate::service::{InsightsService, RecomputeSummary};

pub fn create_client_router(service: InsightsService) -> Router {
    Router::new()
        .route("/clients", get(list_clients))
        .route("/clients/:client_id/answers", get(get_answer_sheet))
        .route(
            "/clients/:client_id/recommendations",
            post(recompute_client),
        )
        .route("/recommendations/recompute", post(recompute_all))
        .with_state(service)
}

async fn list_clients(
    State(service): State<InsightsService>,
    Query(query): Query<ClientQuery>,
) -> Result<Json<Vec<ClientSummary>>, InsightsError> {
    let filter = ClientFilter::from_query(&query, service.scheme())?;
    service.clients(&filter).await.map(Json)
}

async fn get_answer_sheet(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
) -> Result<Json<AnswerSheet>, InsightsError> {
    service
        .answer_sheet(&ClientId::from(client_id))
        .await
        .map(Json)
}

async fn recompute_client(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
) -> Result<Json<Recommendation>, InsightsError> {
    let client_id = ClientId::from(client_id);
    info!("Recompute requested for client {}", client_id);
    service.recompute_client(&client_id).await.map(Json)
}

async fn recompute_all(
    State(service): State<InsightsService>,
) -> Result<Json<RecomputeSummary>, InsightsError> {
    service.recompute_all().await.map(Json)
}
