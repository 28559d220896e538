//! HTTP surface: a single endpoint that triggers one report round trip.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use hotelguide_domain::{DomainError, ReportRequestService, ResultItem};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub report_service: Arc<ReportRequestService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/reports", post(generate_report))
        .with_state(state)
}

pub async fn serve(
    host: &str,
    port: u16,
    state: AppState,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(DomainError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DomainError::Publish(_) | DomainError::Topology(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(status = %status, error = %self.0, "report request failed");
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

async fn generate_report(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResultItem>>, ApiError> {
    let results = state.report_service.generate_report().await.map_err(ApiError)?;
    Ok(Json(results))
}
