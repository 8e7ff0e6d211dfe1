use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::{interval::InvalidInterval, store::StoreError};

/// Every failure a service can hand back to the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    InvalidInterval(#[from] InvalidInterval),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("overlaps {} existing event(s)", .event_ids.len())]
    Conflict { event_ids: Vec<Uuid> },

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidInterval(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInterval(_) => "invalid_interval",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Storage(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Storage(_) | AppError::Internal(_) => {
                // detail stays in the logs
                tracing::error!(error = %self, "request failed");
                json!({ "error": "Internal server error", "code": self.code() })
            }
            AppError::Conflict { event_ids } => json!({
                "error": self.to_string(),
                "code": self.code(),
                "conflicting_event_ids": event_ids,
            }),
            _ => json!({ "error": self.to_string(), "code": self.code() }),
        };
        (status, Json(body)).into_response()
    }
}
