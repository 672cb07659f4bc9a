use crate::state::AppState;
use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Times one request from routing to response.
pub struct RequestTracker {
    start_time: DateTime<Utc>,
    method: Method,
    path: String,
}

impl RequestTracker {
    pub fn new(method: Method, path: &str) -> Self {
        RequestTracker {
            // `Instant` is unavailable on wasm32; the worker clock is.
            start_time: Utc::now(),
            method,
            path: path.to_string(),
        }
    }

    pub fn complete(self, status: StatusCode) -> i64 {
        let duration_ms = (Utc::now() - self.start_time).num_milliseconds();

        if status.is_server_error() {
            warn!(
                method = %self.method,
                path = %self.path,
                status = status.as_u16(),
                duration_ms = duration_ms,
                "Request failed"
            );
        } else {
            info!(
                method = %self.method,
                path = %self.path,
                status = status.as_u16(),
                duration_ms = duration_ms,
                "Request completed"
            );
        }
        duration_ms
    }
}

pub async fn track_request(req: Request, next: Next) -> Response {
    let tracker = RequestTracker::new(req.method().clone(), req.uri().path());
    let response = next.run(req).await;
    tracker.complete(response.status());
    response
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    #[serde(rename = "ok")]
    Healthy,
    #[serde(rename = "degraded")]
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    pub timestamp: DateTime<Utc>,
    pub message: &'static str,
    pub integrations: BTreeMap<&'static str, bool>,
}

/// Reports which integrations have their secrets and bindings in place.
pub fn health_status(state: &AppState) -> HealthStatus {
    let config = &state.config;
    let mut integrations = BTreeMap::new();
    integrations.insert("google_maps", config.google_maps_api_key.is_some());
    integrations.insert(
        "session_tokens",
        config.jwt_secret.is_some() && config.google_client_id.is_some(),
    );
    integrations.insert("user_store", state.store.is_some());
    integrations.insert(
        "uber",
        config.uber.client_id.is_some() && config.uber.client_secret.is_some(),
    );
    integrations.insert(
        "ola",
        config.ola.client_id.is_some() && config.ola.client_secret.is_some(),
    );

    let status = if integrations.values().all(|&v| v) {
        ServiceStatus::Healthy
    } else {
        ServiceStatus::Degraded
    };

    HealthStatus {
        status,
        timestamp: Utc::now(),
        message: "Mumbai Transport API is running",
        integrations,
    }
}
