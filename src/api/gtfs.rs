use crate::{
    error::{ApiError, Result},
    processing::gtfs::{decode_feed, feed_request, GTFS_CACHE_TTL},
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::{header, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    format: Option<String>,
}

/// `/api/gtfs/{agency}/{feed}`; the segments are split here so that a
/// missing feed answers 400 rather than falling through to the 404 handler.
pub async fn feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
    uri: Uri,
) -> Result<Response> {
    let segments: Vec<&str> = uri
        .path()
        .trim_start_matches("/api/gtfs")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let (agency, feed) = match segments.as_slice() {
        [agency, feed, ..] => (*agency, *feed),
        _ => {
            return Err(ApiError::BadRequest(
                "Bad request: expected /api/gtfs/{agency}/{feed}".into(),
            ))
        }
    };

    let request = feed_request(&state.config, agency, feed)?;
    let upstream = state
        .upstream
        .send(request)
        .await?
        .ensure_success("gtfs feed")?;

    if params.format.as_deref() == Some("json") {
        let summary = decode_feed(&upstream.body)?;
        return Ok(Json(summary).into_response());
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-protobuf".to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", GTFS_CACHE_TTL),
            ),
        ],
        upstream.body,
    )
        .into_response())
}
