//! Handlers for the health endpoints.
//!
//! The aggregate endpoint runs every configured probe; per-dependency
//! endpoints run exactly one. Both produce plain JSON bodies whose HTTP
//! status encodes the verdict: 200/503 for the aggregate, 200/500 for a
//! single probe. A path outside the endpoint table is a 404 naming the
//! unmatched path.

use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Json, Response},
};
use tracing::instrument;

use crate::error::AppError;
use crate::probe::Endpoint;
use crate::state::AppState;

/// Service banner: name, version, and the configured probe set.
#[instrument(name = "health::index", skip(state))]
pub async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "probes": state.registry.names(),
    }))
}

/// Aggregate health report over every configured probe.
#[instrument(name = "health::aggregate", skip(state))]
pub async fn aggregate(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.registry.run_all().await;
    tracing::info!(
        overall = report.overall,
        probes = report.results.len(),
        "aggregate health computed"
    );
    (report.status_code(), Json(report))
}

/// Fallback handler: resolve the path against the endpoint table built at
/// startup. Known probe paths run that single probe; anything else is 404.
#[instrument(name = "health::dispatch", skip(state), fields(path = %uri.path()))]
pub async fn dispatch(State(state): State<AppState>, uri: Uri) -> Result<Response, AppError> {
    if state.registry.resolve(uri.path()) == Endpoint::NotFound {
        return Err(AppError::UnknownEndpoint(uri.path().to_string()));
    }
    let (body, status) = state.registry.route_health(uri.path()).await;
    Ok((status, Json(body)).into_response())
}
