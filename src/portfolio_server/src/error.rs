use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use portfolio::{FieldError, PortfolioError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::webhook::SignatureError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid webhook signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("Webhooks are not configured")]
    WebhookDisabled,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self {
        AppError::MalformedPayload(r.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(r: QueryRejection) -> Self {
        AppError::MalformedPayload(r.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(r: PathRejection) -> Self {
        AppError::MalformedPayload(r.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, fields) = match &self {
            AppError::Portfolio(PortfolioError::NotFound { .. }) => (StatusCode::NOT_FOUND, vec![]),
            AppError::Portfolio(PortfolioError::Unauthorized) => (StatusCode::UNAUTHORIZED, vec![]),
            AppError::Portfolio(PortfolioError::Validation(f)) => (StatusCode::BAD_REQUEST, f.clone()),
            AppError::MalformedPayload(_) | AppError::Signature(_) => (StatusCode::BAD_REQUEST, vec![]),
            AppError::WebhookDisabled => (StatusCode::SERVICE_UNAVAILABLE, vec![]),
            AppError::Portfolio(PortfolioError::Database(_) | PortfolioError::Internal(_))
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, vec![]),
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else if !fields.is_empty() {
            "Validation failed".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { error: message, fields })).into_response()
    }
}
