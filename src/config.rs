use crate::{
    error::{ApiError, Result},
    meta::ride::Provider,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_PORTAL_ORIGIN: &str = "https://jobchta.github.io/mumbaitransport";
pub const DEFAULT_DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";
pub const DEFAULT_PLACES_URL: &str = "https://maps.googleapis.com/maps/api/place";
pub const DEFAULT_DISTANCE_MATRIX_URL: &str =
    "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Resolves configuration names (vars and secrets) to values.
pub trait SecretSource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

impl SecretSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub directions: String,
    pub places: String,
    pub distance_matrix: String,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub app_token: Option<String>,
    pub api_base: String,
    pub auth_base: String,
}

#[derive(Clone)]
pub struct Config {
    pub jwt_secret: Option<String>,
    pub google_client_id: Option<String>,
    pub google_maps_api_key: Option<String>,
    pub google: GoogleEndpoints,
    pub uber: ProviderConfig,
    pub ola: ProviderConfig,
    pub portal_origin: String,
    pub log_level: String,
    source: Arc<dyn SecretSource>,
}

impl Config {
    pub fn load(source: Arc<dyn SecretSource>) -> Self {
        let get = |name: &str| non_empty(source.lookup(name));
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        Config {
            jwt_secret: get("JWT_SECRET"),
            google_client_id: get("GOOGLE_CLIENT_ID"),
            google_maps_api_key: get("GOOGLE_MAPS_API_KEY"),
            google: GoogleEndpoints {
                directions: get_or("GOOGLE_TRANSIT_BASE_URL", DEFAULT_DIRECTIONS_URL),
                places: get_or("GOOGLE_PLACES_BASE_URL", DEFAULT_PLACES_URL),
                distance_matrix: get_or(
                    "GOOGLE_DISTANCE_MATRIX_BASE_URL",
                    DEFAULT_DISTANCE_MATRIX_URL,
                ),
            },
            uber: ProviderConfig {
                client_id: get("UBER_CLIENT_ID"),
                client_secret: get("UBER_CLIENT_SECRET"),
                redirect_uri: get("UBER_REDIRECT_URI"),
                app_token: None,
                api_base: get_or("UBER_API_BASE_URL", "https://api.uber.com"),
                auth_base: get_or("UBER_AUTH_BASE_URL", "https://login.uber.com"),
            },
            ola: ProviderConfig {
                client_id: get("OLA_CLIENT_ID"),
                client_secret: get("OLA_CLIENT_SECRET"),
                redirect_uri: get("OLA_REDIRECT_URI"),
                app_token: get("OLA_APP_TOKEN"),
                api_base: get_or("OLA_API_BASE_URL", "https://devapi.olacabs.com"),
                auth_base: get_or("OLA_AUTH_BASE_URL", "https://accounts.olacabs.com"),
            },
            portal_origin: get_or("PORTAL_ORIGIN", DEFAULT_PORTAL_ORIGIN)
                .trim_end_matches('/')
                .to_string(),
            log_level: get_or("LOG_LEVEL", "info"),
            source,
        }
    }

    /// Looks up a key that is not part of the fixed configuration, such as
    /// per-agency GTFS feed URLs.
    pub fn lookup(&self, name: &str) -> Option<String> {
        non_empty(self.source.lookup(name))
    }

    pub fn provider(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Uber => &self.uber,
            Provider::Ola => &self.ola,
        }
    }

    pub fn jwt_secret(&self) -> Result<&str> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| ApiError::ConfigError("Missing JWT_SECRET secret in Worker env".into()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
