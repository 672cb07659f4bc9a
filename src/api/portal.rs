use crate::{
    error::Result,
    proxy::{
        cache_ttl, ensure_content_type, forwardable_headers, portal_upstream_path,
        strip_response_headers, upstream_url, UpstreamRequest,
    },
    state::AppState,
};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::debug;

pub async fn redirect_root() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/portal/")]).into_response()
}

/// Serves the static portal from its origin under `/portal`.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let Some(path) = portal_upstream_path(uri.path()) else {
        return Ok((StatusCode::NOT_FOUND, "Not Found").into_response());
    };
    let url = upstream_url(&state.config.portal_origin, &path, uri.query());
    debug!(url = %url, "Proxying portal request");

    let forward_body = method != Method::GET && method != Method::HEAD;
    let request = UpstreamRequest {
        method,
        url,
        headers: forwardable_headers(&headers),
        body: forward_body.then_some(body),
        cache_ttl: Some(cache_ttl(&path)),
    };
    let upstream = state.upstream.send(request).await?;

    let mut response_headers = upstream.headers;
    strip_response_headers(&mut response_headers);
    ensure_content_type(&mut response_headers, &path);
    response_headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    if let Some(requested) = headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        response_headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
