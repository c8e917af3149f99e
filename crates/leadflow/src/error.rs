use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::distribution::{AssignmentError, DistributionError, RepositoryError};
use crate::telemetry::TelemetryError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Distribution(DistributionError),
    Assignment(AssignmentError),
    Seed(RepositoryError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Distribution(err) => write!(f, "distribution error: {}", err),
            AppError::Assignment(err) => write!(f, "assignment error: {}", err),
            AppError::Seed(err) => write!(f, "failed to seed marketplace: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Distribution(err) => Some(err),
            AppError::Assignment(err) => Some(err),
            AppError::Seed(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Distribution(DistributionError::Validation(_))
            | AppError::Assignment(AssignmentError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Distribution(
                DistributionError::LeadNotFound(_) | DistributionError::DistributionNotFound(_),
            )
            | AppError::Assignment(AssignmentError::LeadNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Distribution(
                DistributionError::LeadClosed { .. } | DistributionError::InvalidTransition { .. },
            ) => StatusCode::CONFLICT,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Distribution(DistributionError::Repository(_))
            | AppError::Assignment(AssignmentError::Lookup(_) | AssignmentError::Commit(_))
            | AppError::Seed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<DistributionError> for AppError {
    fn from(value: DistributionError) -> Self {
        Self::Distribution(value)
    }
}

impl From<AssignmentError> for AppError {
    fn from(value: AssignmentError) -> Self {
        Self::Assignment(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Seed(value)
    }
}
