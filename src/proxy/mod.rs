pub mod upstream;

use axum::http::{header, HeaderMap};

pub use upstream::{FetchUpstream, Upstream, UpstreamRequest, UpstreamResponse};

pub const PORTAL_PREFIX: &str = "/portal";
pub const ASSET_CACHE_TTL: u32 = 3600;
pub const PAGE_CACHE_TTL: u32 = 120;

/// Request headers never forwarded to the origin.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "accept-encoding",
    "content-length",
    "host",
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "x-forwarded-proto",
    "x-forwarded-for",
];

// The runtime already decoded and buffered the upstream body.
const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "content-encoding",
];

const ASSET_EXTENSIONS: &[&str] = &[
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "json", "txt", "xml", "map",
    "woff", "woff2",
];

/// Maps `/portal/...` to the origin path. `None` when the path is outside
/// the portal.
pub fn portal_upstream_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix(PORTAL_PREFIX)?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    if rest.is_empty() || rest == "/" {
        return Some("/index.html".to_string());
    }
    Some(rest.to_string())
}

pub fn upstream_url(origin: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}{}?{}", origin, path, q),
        _ => format!("{}{}", origin, path),
    }
}

pub fn should_forward_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !HOP_BY_HOP_HEADERS.contains(&lower.as_str())
}

pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if should_forward_header(name.as_str()) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

pub fn strip_response_headers(headers: &mut HeaderMap) {
    for name in STRIPPED_RESPONSE_HEADERS {
        headers.remove(*name);
    }
}

fn extension(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

pub fn is_asset(path: &str) -> bool {
    ASSET_EXTENSIONS.contains(&extension(path).as_str())
}

pub fn cache_ttl(path: &str) -> u32 {
    if is_asset(path) {
        ASSET_CACHE_TTL
    } else {
        PAGE_CACHE_TTL
    }
}

pub fn guess_content_type(path: &str) -> Option<&'static str> {
    let content_type = match extension(path).as_str() {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "xml" => "application/xml; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => return None,
    };
    Some(content_type)
}

/// Fills in `content-type` from the path when the origin left it out.
pub fn ensure_content_type(headers: &mut HeaderMap, path: &str) {
    if headers.contains_key(header::CONTENT_TYPE) {
        return;
    }
    if let Some(guessed) = guess_content_type(path) {
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(guessed));
    }
}
