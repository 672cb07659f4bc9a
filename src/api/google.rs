use crate::{
    error::{ApiError, Result},
    processing::google::{build_url, GoogleService, GOOGLE_CACHE_TTL},
    proxy::UpstreamRequest,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};

pub async fn proxy(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let service = GoogleService::from_segment(&service).ok_or_else(|| {
        ApiError::BadRequest(
            "Unknown Google API service. Use: directions | places | distance-matrix".into(),
        )
    })?;
    let url = build_url(&state.config, service, &params)?;

    let upstream = state
        .upstream
        .send(UpstreamRequest::get(url.to_string()).cached(GOOGLE_CACHE_TTL))
        .await?;

    // Google reports most failures inside a 200 body, so the status is
    // passed through untouched.
    Ok((
        upstream.status,
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8".to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", GOOGLE_CACHE_TTL),
            ),
        ],
        upstream.body,
    )
        .into_response())
}
