use crate::error::{ApiError, Result};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
};
use tracing::{info, warn};
use worker::{js_sys, send::SendFuture, CfProperties, Fetch, Headers, RequestInit};

/// Outbound request, fully buffered.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Edge cache TTL for the subrequest.
    pub cache_ttl: Option<u32>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        UpstreamRequest {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            cache_ttl: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        UpstreamRequest {
            method: Method::POST,
            body: Some(body.into()),
            ..UpstreamRequest::get(url)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::ConfigError(format!("Invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::ConfigError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn bearer(self, token: &str) -> Result<Self> {
        self.header("authorization", &format!("Bearer {}", token))
    }

    pub fn cached(mut self, ttl: u32) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::Upstream(format!("Invalid JSON from upstream: {}", e)))
    }

    /// Fails with a 502 unless the upstream answered 2xx.
    pub fn ensure_success(self, what: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            warn!(upstream = what, status = self.status.as_u16(), "Upstream returned an error");
            Err(ApiError::UpstreamStatus(self.status.as_u16()))
        }
    }
}

/// Every outbound HTTP call goes through this seam.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse>;
}

/// `fetch()` on the Workers runtime
pub struct FetchUpstream;

#[async_trait]
impl Upstream for FetchUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        SendFuture::new(fetch(request)).await
    }
}

fn fetch_error(e: worker::Error) -> ApiError {
    ApiError::Upstream(e.to_string())
}

async fn fetch(request: UpstreamRequest) -> Result<UpstreamResponse> {
    let mut headers = Headers::new();
    for (name, value) in request.headers.iter() {
        if let Ok(value) = value.to_str() {
            headers.append(name.as_str(), value).map_err(fetch_error)?;
        }
    }

    let mut init = RequestInit::new();
    init.with_method(worker::Method::from(request.method.to_string()))
        .with_headers(headers);

    if let Some(body) = request.body {
        init.with_body(Some(js_sys::Uint8Array::from(body.as_ref()).into()));
    }

    if let Some(ttl) = request.cache_ttl {
        let mut cf = CfProperties::default();
        cf.cache_everything = Some(true);
        cf.cache_ttl = Some(ttl);
        init.cf = cf;
    }

    let outbound = worker::Request::new_with_init(&request.url, &init).map_err(fetch_error)?;
    let mut response = Fetch::Request(outbound).send().await.map_err(fetch_error)?;

    let status = StatusCode::from_u16(response.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_headers = HeaderMap::new();
    for (name, value) in response.headers().entries() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response_headers.append(name, value);
        }
    }
    let body = response.bytes().await.map_err(fetch_error)?;

    info!(method = %request.method, status = status.as_u16(), "Upstream responded");

    Ok(UpstreamResponse {
        status,
        headers: response_headers,
        body: Bytes::from(body),
    })
}
