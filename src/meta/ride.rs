use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Uber,
    Ola,
}

impl Provider {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "uber" => Some(Provider::Uber),
            "ola" => Some(Provider::Ola),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Uber => "uber",
            Provider::Ola => "ola",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Uber => "Uber",
            Provider::Ola => "Ola",
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Provider::Uber => &["profile", "request", "request_receipt"],
            Provider::Ola => &["profile", "booking"],
        }
    }

    /// OAuth authorize path on the provider's auth host.
    pub fn authorize_path(&self) -> &'static str {
        match self {
            Provider::Uber => "/oauth/v2/authorize",
            Provider::Ola => "/oauth2/authorize",
        }
    }

    pub fn token_path(&self) -> &'static str {
        match self {
            Provider::Uber => "/oauth/v2/token",
            Provider::Ola => "/oauth2/token",
        }
    }

    pub fn state_key(&self, user_id: &str) -> String {
        format!("{}_state:{}", self.as_str(), user_id)
    }

    pub fn callback_path(&self) -> String {
        format!("/api/rides/{}/callback", self.as_str())
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimate and booking body. Ola's field names are accepted as aliases so
/// both providers share one shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripRequest {
    #[serde(default, alias = "pickup_lat")]
    pub start_latitude: Option<f64>,
    #[serde(default, alias = "pickup_lng")]
    pub start_longitude: Option<f64>,
    #[serde(default, alias = "drop_lat")]
    pub end_latitude: Option<f64>,
    #[serde(default, alias = "drop_lng")]
    pub end_longitude: Option<f64>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trip {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
}

impl TripRequest {
    pub fn trip(&self) -> Result<Trip> {
        match (
            self.start_latitude,
            self.start_longitude,
            self.end_latitude,
            self.end_longitude,
        ) {
            (Some(start_latitude), Some(start_longitude), Some(end_latitude), Some(end_longitude))
                if [start_latitude, start_longitude, end_latitude, end_longitude]
                    .iter()
                    .all(|c| c.is_finite()) =>
            {
                Ok(Trip {
                    start_latitude,
                    start_longitude,
                    end_latitude,
                    end_longitude,
                })
            }
            _ => Err(ApiError::BadRequest("Missing required coordinates".into())),
        }
    }

    /// Product (Uber) or category (Ola) the rider picked.
    pub fn product(&self, provider: Provider) -> Result<&str> {
        let product = match provider {
            Provider::Uber => self.product_id.as_deref(),
            Provider::Ola => self.category.as_deref(),
        };
        product
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Missing required parameters".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideEstimate {
    pub service: String,
    pub estimate: Option<String>,
    pub low_estimate: Option<Value>,
    pub high_estimate: Option<Value>,
    pub currency_code: Option<String>,
    pub duration: Option<Value>,
    pub distance: Option<Value>,
    pub surge_multiplier: f64,
}
