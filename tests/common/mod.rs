// Shared harness for router-level tests: in-memory KV, map-backed secrets
// and a scripted upstream that records every outbound request.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use transit_edge::{
    api::routes::routes,
    config::{Config, SecretSource},
    crypto::token::{self, SessionClaims},
    error::{ApiError, Result},
    processing::{auth::GoogleIdentity, users::UserRepository},
    proxy::{Upstream, UpstreamRequest, UpstreamResponse},
    state::AppState,
    storage::{memory::MemoryStorage, KvStore},
};

pub const JWT_SECRET: &str = "integration-secret";
pub const GOOGLE_CLIENT_ID: &str = "client-123.apps.googleusercontent.com";

#[derive(Default)]
pub struct ScriptedUpstream {
    routes: Mutex<Vec<(String, UpstreamResponse)>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedUpstream {
    /// Answers requests whose URL starts with `url_prefix`. Earlier
    /// registrations win.
    pub fn respond(&self, url_prefix: &str, status: u16, body: impl Into<Bytes>) {
        self.respond_with(url_prefix, status, HeaderMap::new(), body);
    }

    pub fn respond_with(
        &self,
        url_prefix: &str,
        status: u16,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) {
        let response = UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: body.into(),
        };
        self.routes
            .lock()
            .unwrap()
            .push((url_prefix.to_string(), response));
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> UpstreamRequest {
        self.requests().pop().expect("no upstream request recorded")
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.routes
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| ApiError::Upstream(format!("connection refused: {}", request.url)))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStorage,
    pub upstream: Arc<ScriptedUpstream>,
}

fn source(vars: &[(&str, &str)]) -> Arc<dyn SecretSource> {
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("JWT_SECRET".into(), JWT_SECRET.into());
    map.insert("GOOGLE_CLIENT_ID".into(), GOOGLE_CLIENT_ID.into());
    for (k, v) in vars {
        map.insert(k.to_string(), v.to_string());
    }
    Arc::new(map)
}

/// App with a KV store and the session secrets set; `vars` adds or
/// overrides configuration.
pub fn app(vars: &[(&str, &str)]) -> TestApp {
    build(vars, true)
}

pub fn app_without_store(vars: &[(&str, &str)]) -> TestApp {
    build(vars, false)
}

fn build(vars: &[(&str, &str)], with_store: bool) -> TestApp {
    let store = MemoryStorage::new();
    let upstream = Arc::new(ScriptedUpstream::default());
    let state = AppState::new(
        Config::load(source(vars)),
        with_store.then(|| Arc::new(store.clone()) as Arc<dyn KvStore>),
        upstream.clone(),
    );
    TestApp {
        router: routes(state),
        store,
        upstream,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Creates the user record the way a Google sign-in would.
    pub async fn seed_user(&self, sub: &str, email: &str) {
        let identity = GoogleIdentity {
            sub: sub.to_string(),
            email: email.to_string(),
            name: "Asha Patil".to_string(),
            picture: None,
            aud: GOOGLE_CLIENT_ID.to_string(),
        };
        UserRepository::new(&self.store)
            .upsert_from_identity(&identity, Utc::now())
            .await
            .unwrap();
    }
}

pub fn session_cookie(sub: &str, email: &str) -> String {
    let claims = SessionClaims::new(sub, email, "Asha Patil", Utc::now());
    format!("auth_token={}", token::issue(&claims, JWT_SECRET).unwrap())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn authed(method: &str, uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("cookie", cookie)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
