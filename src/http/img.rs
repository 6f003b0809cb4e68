//! `GET /img`: fetch, transform and return an image.

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::response::AppError;
use super::server::AppState;
use crate::observability::metrics;
use crate::pipeline::format::content_type_for;
use crate::pipeline::TransformRequest;
use crate::validation::RawParams;

/// Transformed images never change for a given query.
pub const CACHE_CONTROL: &str = "max-age=31536000";

pub async fn transform_image(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let raw = RawParams::from_query(query.as_deref().unwrap_or(""));
    let request = TransformRequest::validate(&raw)?;
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    tracing::debug!(
        url = %request.source_image_url,
        format = ?request.format,
        width = ?request.width,
        height = ?request.height,
        fit = ?request.fit,
        "Transforming image"
    );

    let pipeline = state.pipeline.load_full();
    let result = pipeline.execute(&request, accept).await?;

    let format = result.format.as_deref();
    metrics::record_transform(format.unwrap_or("unknown"), result.size());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(format)),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        result.data,
    )
        .into_response())
}
