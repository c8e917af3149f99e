use crate::infra::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use leadflow::distribution::{
    distribution_router, DistributionRecord, LeadDistributionService, LeadId, MarketplaceStore,
    NotificationSink, RankedProvider,
};
use leadflow::error::AppError;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct ExpirySweepResponse {
    pub(crate) expired: usize,
    pub(crate) distributions: Vec<DistributionRecord>,
}

pub(crate) fn with_distribution_routes<S, N>(
    service: Arc<LeadDistributionService<S, N>>,
) -> Router
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let operations = Router::new()
        .route(
            "/api/v1/leads/:lead_id/ranking",
            get(ranking_endpoint::<S, N>),
        )
        .route(
            "/api/v1/distributions/expire",
            post(expire_endpoint::<S, N>),
        )
        .with_state(service.clone());

    distribution_router(service)
        .merge(operations)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Score breakdown for every provider a lead could be offered to.
pub(crate) async fn ranking_endpoint<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
    Path(lead_id): Path<String>,
) -> Result<Json<Vec<RankedProvider>>, AppError>
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let ranking = service.rank_candidates(&LeadId(lead_id))?;
    Ok(Json(ranking))
}

pub(crate) async fn expire_endpoint<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
) -> Result<Json<ExpirySweepResponse>, AppError>
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let distributions = service.expire_stale()?;
    Ok(Json(ExpirySweepResponse {
        expired: distributions.len(),
        distributions,
    }))
}
