//! Application error taxonomy and its HTTP rendering.
//!
//! "Missing" and "owned by someone else" are the same [`AppError::NotFound`];
//! there is deliberately no forbidden variant.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::domain::ContentError;

/// Result alias used by stores and handlers.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No session, or the session could not be verified.
    #[error("{0}")]
    Unauthorized(String),

    /// Entity absent or owned by another user.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Persisted content no longer decodes.
    #[error("Stored content could not be read: {0}")]
    MalformedContent(String),

    /// External collaborator unconfigured or unreachable.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Missing field or out-of-range value.
    #[error("{0}")]
    Validation(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::MalformedContent(_) => "malformed_content",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Validation(_) => "validation_error",
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::Internal(_) => "internal_error",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MalformedContent(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Content error raised while reading stored data.
    #[must_use]
    pub fn on_read(err: ContentError) -> Self {
        match err {
            ContentError::Malformed(msg) | ContentError::Invalid(msg) => {
                Self::MalformedContent(msg)
            }
            ContentError::Encode(e) => Self::Internal(e.into()),
        }
    }

    /// Content error raised while accepting client data.
    #[must_use]
    pub fn on_write(err: ContentError) -> Self {
        match err {
            ContentError::Malformed(msg) | ContentError::Invalid(msg) => Self::Validation(msg),
            ContentError::Encode(e) => Self::Internal(e.into()),
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(err) => tracing::error!(error = %format!("{err:#}"), "Request failed"),
            Self::MalformedContent(msg) => tracing::error!(error = %msg, "Stored content is malformed"),
            _ => tracing::debug!(code = self.code(), error = %self, "Request rejected"),
        }

        let retry_after = match &self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
