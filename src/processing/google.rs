use crate::{
    config::Config,
    error::{ApiError, Result},
};
use url::Url;

pub const GOOGLE_CACHE_TTL: u32 = 30;
pub const DEFAULT_PLACES_ENDPOINT: &str = "nearbysearch/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleService {
    Directions,
    Places,
    DistanceMatrix,
}

impl GoogleService {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "directions" => Some(GoogleService::Directions),
            "places" => Some(GoogleService::Places),
            "distance-matrix" => Some(GoogleService::DistanceMatrix),
            _ => None,
        }
    }

    fn defaults(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            GoogleService::Directions => &[
                ("mode", "transit"),
                ("region", "in"),
                ("language", "en-IN"),
                ("units", "metric"),
                ("alternatives", "true"),
                ("departure_time", "now"),
            ],
            GoogleService::Places => &[("region", "in"), ("language", "en-IN")],
            GoogleService::DistanceMatrix => &[
                ("mode", "transit"),
                ("region", "in"),
                ("language", "en-IN"),
                ("units", "metric"),
            ],
        }
    }
}

// Places sub-endpoints look like `nearbysearch/json` or `textsearch/json`.
fn valid_places_endpoint(endpoint: &str) -> bool {
    match endpoint.split_once('/') {
        Some((name, "json")) => !name.is_empty() && name.bytes().all(|b| b.is_ascii_lowercase()),
        _ => false,
    }
}

/// Upstream URL with the secret key injected, replacing any key sent by the
/// client, and Mumbai-friendly defaults for parameters the client left out.
pub fn build_url(
    config: &Config,
    service: GoogleService,
    client_params: &[(String, String)],
) -> Result<Url> {
    let api_key = config.google_maps_api_key.as_deref().ok_or_else(|| {
        ApiError::ConfigError("Missing GOOGLE_MAPS_API_KEY secret in Worker env".into())
    })?;

    let mut params: Vec<(String, String)> = client_params
        .iter()
        .filter(|(k, _)| k != "key")
        .cloned()
        .collect();

    let base = match service {
        GoogleService::Directions => config.google.directions.clone(),
        GoogleService::DistanceMatrix => config.google.distance_matrix.clone(),
        GoogleService::Places => {
            let endpoint = params
                .iter()
                .find(|(k, _)| k == "endpoint")
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| DEFAULT_PLACES_ENDPOINT.to_string());
            if !valid_places_endpoint(&endpoint) {
                return Err(ApiError::BadRequest(format!(
                    "Invalid places endpoint: {}",
                    endpoint
                )));
            }
            params.retain(|(k, _)| k != "endpoint");
            format!("{}/{}", config.google.places.trim_end_matches('/'), endpoint)
        }
    };

    for (name, value) in service.defaults() {
        if !params.iter().any(|(k, _)| k == name) {
            params.push((name.to_string(), value.to_string()));
        }
    }
    params.push(("key".to_string(), api_key.to_string()));

    Url::parse_with_params(&base, &params)
        .map_err(|e| ApiError::ConfigError(format!("Invalid Google base URL {}: {}", base, e)))
}
