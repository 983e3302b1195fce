use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::smartrecruiters::ApiClientError;
use domain::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::DuplicateExternalId(id) => {
                ApiError::Conflict(format!("Job {id} already exists"))
            }
            StoreError::MissingExternalId => {
                ApiError::Validation("Record has no external id".to_string())
            }
            StoreError::Backend(msg) => ApiError::Internal(format!("Storage error: {msg}")),
        }
    }
}

impl From<ApiClientError> for ApiError {
    fn from(err: ApiClientError) -> Self {
        match &err {
            ApiClientError::Auth(msg) => {
                ApiError::ServiceUnavailable(format!("Failed to obtain access token: {msg}"))
            }
            ApiClientError::Status { status: 404, .. } => {
                ApiError::NotFound("Remote resource not found".to_string())
            }
            ApiClientError::Status { status, .. } => {
                ApiError::Internal(format!("Remote API error: HTTP {status}"))
            }
            ApiClientError::Transport(msg) => {
                ApiError::ServiceUnavailable(format!("Remote API unreachable: {msg}"))
            }
            ApiClientError::Malformed(msg) => {
                ApiError::Internal(format!("Malformed remote API response: {msg}"))
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.as_ref().map(|m| m.to_string()).unwrap_or_default()
                    )
                })
            })
            .collect();

        ApiError::Validation(messages.join(", "))
    }
}
