//! Error responses.
//!
//! # Responsibilities
//! - Map every handler error onto an HTTP status
//! - Render the JSON error envelope
//! - Log 4xx at warn and 5xx at error
//!
//! # Design Decisions
//! - One boundary type, [`AppError`]; handlers return `Result<_, AppError>`
//! - Internal detail only reaches `userMessage` for user-friendly errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::{EngineError, FetchError, TransformError};
use crate::validation::{FieldError, ValidationError};

/// An error rendered as `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    status: StatusCode,
    message: String,
    user_friendly: bool,
    details: Option<Vec<FieldError>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    message: &'a str,
    user_message: &'a str,
    http_status_code: u16,
    user_friendly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [FieldError]>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    error: ErrorBody<'a>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            user_friendly: false,
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Mark the message as safe to show to end users.
    pub fn user_friendly(mut self, user_friendly: bool) -> Self {
        self.user_friendly = user_friendly;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn user_message(&self) -> &str {
        if self.user_friendly {
            &self.message
        } else {
            self.status.canonical_reason().unwrap_or("Error")
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
            user_friendly: true,
            details: Some(err.errors),
        }
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        let status = match err {
            FetchError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            FetchError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            FetchError::Request(_)
            | FetchError::Status(_)
            | FetchError::TooLarge { .. }
            | FetchError::Stream(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::Decode(_) | EngineError::LimitExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<TransformError> for AppError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Validation(e) => e.into(),
            TransformError::Fetch(e) => e.into(),
            TransformError::Engine(e) => e.into(),
            TransformError::Deadline(e) => Self::new(StatusCode::GATEWAY_TIMEOUT, e.to_string()),
            TransformError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.status.as_u16();
        if self.status.is_server_error() {
            tracing::error!(status = code, error = %self.message, "Request failed");
        } else {
            tracing::warn!(status = code, error = %self.message, "Request rejected");
        }

        let body = Envelope {
            error: ErrorBody {
                message: &self.message,
                user_message: self.user_message(),
                http_status_code: code,
                user_friendly: self.user_friendly,
                details: self.details.as_deref(),
            },
        };
        (self.status, Json(body)).into_response()
    }
}
