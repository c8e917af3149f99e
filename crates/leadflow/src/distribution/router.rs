use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::assignment::AssignmentError;
use super::domain::{DistributionId, LeadId, LeadSubmission};
use super::repository::{MarketplaceStore, NotificationSink, RepositoryError};
use super::service::{DistributionError, LeadDistributionService, ProviderResponse};

/// Router exposing lead intake, fan-out, auto-assignment, and offer responses.
pub fn distribution_router<S, N>(service: Arc<LeadDistributionService<S, N>>) -> Router
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(submit_handler::<S, N>))
        .route(
            "/api/v1/leads/:lead_id/distribute",
            post(distribute_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/:lead_id/auto-assign",
            post(auto_assign_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/:lead_id/distributions",
            get(distributions_handler::<S, N>),
        )
        .route(
            "/api/v1/distributions/:distribution_id/view",
            post(view_handler::<S, N>),
        )
        .route(
            "/api/v1/distributions/:distribution_id/respond",
            post(respond_handler::<S, N>),
        )
        .with_state(service)
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, axum::Json(json!({ "error": message }))).into_response()
}

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::Conflict
        | RepositoryError::StaleLeadStatus { .. }
        | RepositoryError::StaleDistributionStatus { .. } => StatusCode::CONFLICT,
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn distribution_error_response(error: DistributionError) -> Response {
    let status = match &error {
        DistributionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DistributionError::LeadNotFound(_) | DistributionError::DistributionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        DistributionError::LeadClosed { .. } | DistributionError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        DistributionError::Repository(inner) => repository_status(inner),
    };
    error_response(status, error.to_string())
}

pub(crate) fn assignment_error_response(error: AssignmentError) -> Response {
    let status = match &error {
        AssignmentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssignmentError::LeadNotFound(_) => StatusCode::NOT_FOUND,
        AssignmentError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AssignmentError::Commit(inner) => repository_status(inner),
    };
    error_response(status, error.to_string())
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
    axum::Json(submission): axum::Json<LeadSubmission>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    match service.submit_lead(submission) {
        Ok(lead) => (StatusCode::CREATED, axum::Json(lead)).into_response(),
        Err(error) => distribution_error_response(error),
    }
}

pub(crate) async fn distribute_handler<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let lead_id = LeadId(lead_id);
    match service.distribute_lead(&lead_id) {
        Ok(distributions) => {
            let payload = json!({
                "lead_id": lead_id,
                "recipients": distributions.len(),
                "distributions": distributions,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => distribution_error_response(error),
    }
}

pub(crate) async fn auto_assign_handler<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    match service.auto_assign_by_id(&LeadId(lead_id)) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => assignment_error_response(error),
    }
}

pub(crate) async fn distributions_handler<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    match service.distributions_for(&LeadId(lead_id)) {
        Ok(distributions) => (StatusCode::OK, axum::Json(distributions)).into_response(),
        Err(error) => distribution_error_response(error),
    }
}

pub(crate) async fn view_handler<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
    Path(distribution_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    match service.mark_viewed(&DistributionId(distribution_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => distribution_error_response(error),
    }
}

pub(crate) async fn respond_handler<S, N>(
    State(service): State<Arc<LeadDistributionService<S, N>>>,
    Path(distribution_id): Path<String>,
    axum::Json(response): axum::Json<ProviderResponse>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    match service.respond(&DistributionId(distribution_id), response) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => distribution_error_response(error),
    }
}
