//! REST API
//!
//! Axum routers over an [`InsightsService`]. Each request loads its own
//! snapshot through the service; handlers hold no state of their own.

pub mod client_routes;
pub mod statistics_routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::InsightsError;
use crate::service::InsightsService;

pub use client_routes::create_client_router;
pub use statistics_routes::create_statistics_router;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl InsightsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            InsightsError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InsightsError::NotFound { .. } => StatusCode::NOT_FOUND,
            InsightsError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            InsightsError::WriteBack { .. }
            | InsightsError::Config(_)
            | InsightsError::Legacy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for InsightsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            let mut message = self.to_string();
            let mut source = std::error::Error::source(&self);
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = std::error::Error::source(cause);
            }
            tracing::error!("Request failed: {}", message);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Full application router with tracing and CORS
pub fn create_router(service: InsightsService) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(create_statistics_router(service.clone()))
        .merge(create_client_router(service))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
