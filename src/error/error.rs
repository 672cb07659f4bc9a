use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{message}")]
    NotConfigured { message: String, hint: String },

    #[error("Upstream error")]
    UpstreamStatus(u16),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotConfigured { .. } => StatusCode::NOT_IMPLEMENTED,
            ApiError::UpstreamStatus(_) | ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::StorageError(_) | ApiError::ConfigError(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn not_configured(message: impl Into<String>, hint: impl Into<String>) -> Self {
        ApiError::NotConfigured {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::NotConfigured { message, hint } => json!({ "error": message, "hint": hint }),
            ApiError::UpstreamStatus(code) => json!({ "error": "Upstream error", "status": code }),
            // Internal details stay in the log.
            ApiError::Upstream(_) => json!({ "error": "Upstream request failed" }),
            ApiError::ConfigError(message) => json!({ "error": message }),
            ApiError::StorageError(_) | ApiError::Internal(_) => {
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
