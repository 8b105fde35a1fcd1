//! Error handling for the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Standard error response format for all HTTP errors
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        details: Option<String>,
    },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("unauthorized: {message}")]
    Unauthorized {
        message: String,
        details: Option<String>,
    },

    /// Storage failed while serving the request; `details` is the driver message.
    #[error("{message}: {details}")]
    Storage { message: String, details: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    /// Bad request carrying the underlying parser message
    pub fn bad_request_with(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            details,
        }
    }

    /// Create a storage error from the failed operation's message and cause
    pub fn storage(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: message.into(),
            details: cause.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Storage { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { .. } => "bad_request",
            AppError::NotFound { .. } => "not_found",
            AppError::Unauthorized { .. } => "unauthorized",
            AppError::Storage { .. } => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn into_body(self) -> ErrorBody {
        match self {
            AppError::BadRequest { message, details }
            | AppError::Unauthorized { message, details } => ErrorBody {
                error: message,
                details,
            },
            AppError::NotFound { message } => ErrorBody {
                error: message,
                details: None,
            },
            AppError::Storage { message, details } => ErrorBody {
                error: message,
                details: Some(details),
            },
            AppError::Internal(e) => ErrorBody {
                error: "Internal server error".to_string(),
                details: Some(e.to_string()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::now_v7();
        let status = self.status();
        let error_code = self.code();

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                error = %self,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                error = %self,
                "Request rejected"
            );
        }

        (status, Json(self.into_body())).into_response()
    }
}
