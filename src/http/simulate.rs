//! `/test`: a configurable status and latency simulator.
//!
//! Options come from the query string and a JSON body; query keys win.
//! Error statuses (400-599) go through the normal error boundary so clients
//! see the same envelope as real failures.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::RawQuery;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::response::AppError;
use crate::validation::{Coercer, RawParams, ValidationError};

const OBJECT_NAME: &str = "TestHandlerOptions";

pub const MAX_DELAY_MS: u64 = 5_000;

/// A failure the caller asked for.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SimulatedError {
    pub status: StatusCode,
    pub message: String,
    pub user_friendly: bool,
}

impl From<SimulatedError> for AppError {
    fn from(err: SimulatedError) -> Self {
        AppError::new(err.status, err.message).user_friendly(err.user_friendly)
    }
}

/// Validated `/test` options.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    pub status: StatusCode,
    pub delay: Duration,
    pub user_friendly: bool,
    pub response_text: Option<String>,
    pub response_json: Option<Value>,
}

impl SimulateOptions {
    /// Merge query and body options and validate them.
    pub fn parse(query: Option<&str>, body: &[u8]) -> Result<Self, ValidationError> {
        let mut raw = RawParams::from_query(query.unwrap_or(""));
        let body = parse_body(body)?;

        let mut body_params = RawParams::new();
        for (key, value) in &body {
            if key != "responseJson" {
                body_params.push_json(key, value);
            }
        }
        raw.merge_missing(body_params);

        let mut c = Coercer::new(OBJECT_NAME, &raw);
        let status_code: Option<u16> = c.integer("statusCode", 100, Some(599));
        let delay: Option<u64> = c.integer("delay", 0, Some(MAX_DELAY_MS as i64));
        let user_friendly = c.boolean("userFriendly");
        let response_text = c.string("responseText");
        let query_json = c.string("responseJson");

        let response_json = match query_json {
            Some(text) => match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(_) => {
                    c.reject("responseJson", "must be valid JSON");
                    None
                }
            },
            None => body.get("responseJson").filter(|v| !v.is_null()).cloned(),
        };

        c.finish()?;

        let status = match status_code {
            Some(code) => StatusCode::from_u16(code).map_err(|_| {
                ValidationError::field(OBJECT_NAME, "statusCode", "is not a valid HTTP status")
            })?,
            None => StatusCode::OK,
        };

        Ok(Self {
            status,
            delay: Duration::from_millis(delay.unwrap_or(0)),
            user_friendly: user_friendly.unwrap_or(false),
            response_text,
            response_json,
        })
    }

    /// The error to raise, for statuses in 400-599.
    pub fn failure(&self) -> Option<SimulatedError> {
        if !(self.status.is_client_error() || self.status.is_server_error()) {
            return None;
        }
        let message = self.response_text.clone().unwrap_or_else(|| {
            format!(
                "{} {}",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("Unknown")
            )
        });
        Some(SimulatedError {
            status: self.status,
            message,
            user_friendly: self.user_friendly,
        })
    }
}

/// The body as a JSON object; an empty body is an empty object.
fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::field(OBJECT_NAME, "body", "must be a JSON object")),
        Err(e) => Err(ValidationError::field(
            OBJECT_NAME,
            "body",
            format!("is not valid JSON: {}", e),
        )),
    }
}

/// `ALL /test`
pub async fn simulate(RawQuery(query): RawQuery, body: Bytes) -> Result<Response, AppError> {
    let options = SimulateOptions::parse(query.as_deref(), &body)?;

    if let Some(failure) = options.failure() {
        return Err(failure.into());
    }

    if !options.delay.is_zero() {
        tracing::debug!(delay_ms = options.delay.as_millis() as u64, "Simulating latency");
        tokio::time::sleep(options.delay).await;
    }

    let response = match (options.response_json, options.response_text) {
        (Some(value), _) => (options.status, Json(value)).into_response(),
        (None, Some(text)) => (
            options.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        (None, None) => (
            options.status,
            Json(json!({ "statusCode": options.status.as_u16() })),
        )
            .into_response(),
    };
    Ok(response)
}
