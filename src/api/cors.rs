use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};

const READ_METHODS: &str = "GET, HEAD, OPTIONS";
const API_METHODS: &str = "GET, HEAD, POST, PUT, DELETE, OPTIONS";
const PREFLIGHT_MAX_AGE: &str = "86400";
const PREFLIGHT_VARY: &str = "Origin, Access-Control-Request-Headers, Access-Control-Request-Method";

// Surfaces authenticated by the session cookie.
fn is_credentialed(path: &str) -> bool {
    ["/api/auth/", "/api/user/", "/api/rides/"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Answers preflights itself; everything else gets the caller's origin
/// reflected onto the handler's response.
pub async fn cors(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if req.method() == Method::OPTIONS {
        return preflight(req.headers(), &path);
    }

    let origin = req.headers().get(header::ORIGIN).cloned();
    let mut response = next.run(req).await;

    if let Some(origin) = origin {
        let headers = response.headers_mut();
        if !headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        append_vary(headers, "Origin");
        if is_credentialed(&path) {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
    response
}

pub fn preflight(request_headers: &HeaderMap, path: &str) -> Response {
    let origin = request_headers.get(header::ORIGIN).cloned();
    let allow_headers = request_headers
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("Content-Type"));
    let methods = if path.starts_with("/api/") {
        API_METHODS
    } else {
        READ_METHODS
    };

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(methods),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    headers.insert(header::VARY, HeaderValue::from_static(PREFLIGHT_VARY));

    match origin {
        Some(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            if is_credentialed(path) {
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
            }
        }
        None => {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }
    }
    response
}

/// Adds `value` to `Vary` unless already listed.
pub fn append_vary(headers: &mut HeaderMap, value: &str) {
    let existing = headers
        .get(header::VARY)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let merged = match existing {
        Some(current)
            if current
                .split(',')
                .any(|item| item.trim().eq_ignore_ascii_case(value)) =>
        {
            return;
        }
        Some(current) if !current.trim().is_empty() => format!("{}, {}", current, value),
        _ => value.to_string(),
    };
    if let Ok(merged) = HeaderValue::from_str(&merged) {
        headers.insert(header::VARY, merged);
    }
}
