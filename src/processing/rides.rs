use crate::{
    config::ProviderConfig,
    crypto,
    crypto::token::SessionClaims,
    error::{ApiError, Result},
    meta::{ConnectedAccount, Provider, RideEstimate, Trip, TripRequest},
    processing::users::UserRepository,
    proxy::UpstreamRequest,
    state::AppState,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use url::Url;

pub const OAUTH_STATE_TTL_SECS: u64 = 600;

fn provider_config(state: &AppState, provider: Provider) -> Result<&ProviderConfig> {
    let config = state.config.provider(provider);
    if config.client_id.is_none() {
        return Err(ApiError::ConfigError(format!(
            "{} API not configured",
            provider.display_name()
        )));
    }
    Ok(config)
}

fn redirect_uri(config: &ProviderConfig, provider: Provider, request_origin: &str) -> String {
    config
        .redirect_uri
        .clone()
        .unwrap_or_else(|| format!("{}{}", request_origin, provider.callback_path()))
}

pub fn authorization_url(
    config: &ProviderConfig,
    provider: Provider,
    redirect_uri: &str,
    oauth_state: &str,
) -> Result<Url> {
    let base = format!("{}{}", config.auth_base, provider.authorize_path());
    let client_id = config.client_id.as_deref().unwrap_or_default();
    let scope = provider.scopes().join(" ");
    Url::parse_with_params(
        &base,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", oauth_state),
        ],
    )
    .map_err(|e| ApiError::ConfigError(format!("Invalid auth URL {}: {}", base, e)))
}

/// Starts the OAuth flow; the `state` is parked in KV for ten minutes.
pub async fn connect(
    state: &AppState,
    provider: Provider,
    user: &SessionClaims,
    request_origin: &str,
) -> Result<Url> {
    let config = provider_config(state, provider)?;
    let store = state.store()?;

    let oauth_state = crypto::oauth_state();
    store
        .put(
            &provider.state_key(&user.sub),
            oauth_state.clone(),
            Some(OAUTH_STATE_TTL_SECS),
        )
        .await?;

    let redirect = redirect_uri(config, provider, request_origin);
    info!(provider = %provider, user = %user.sub, "Starting OAuth connect");
    authorization_url(config, provider, &redirect, &oauth_state)
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub async fn complete_callback(
    state: &AppState,
    provider: Provider,
    user: &SessionClaims,
    code: &str,
    returned_state: &str,
    request_origin: &str,
) -> Result<()> {
    let config = provider_config(state, provider)?;
    let store = state.store()?;

    let key = provider.state_key(&user.sub);
    let expected = store.get(&key).await?;
    if expected.as_deref() != Some(returned_state) {
        warn!(provider = %provider, user = %user.sub, "OAuth state mismatch");
        return Err(ApiError::BadRequest("Invalid state parameter".into()));
    }

    let redirect = redirect_uri(config, provider, request_origin);
    let form = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", config.client_id.as_deref().unwrap_or_default())
        .append_pair(
            "client_secret",
            config.client_secret.as_deref().unwrap_or_default(),
        )
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", code)
        .append_pair("redirect_uri", &redirect)
        .finish();

    let request = UpstreamRequest::post(
        format!("{}{}", config.auth_base, provider.token_path()),
        form,
    )
    .header("content-type", "application/x-www-form-urlencoded")?;
    let grant: TokenGrant = state
        .upstream
        .send(request)
        .await?
        .ensure_success("token exchange")?
        .json()?;

    let now = Utc::now();
    let account = ConnectedAccount {
        connected: true,
        access_token: Some(grant.access_token),
        refresh_token: grant.refresh_token,
        expires_at: grant.expires_in.and_then(|secs| token_expiry(now, secs)),
        connected_at: Some(now),
    };

    let users = UserRepository::new(store);
    let connected = users.connect_account(&user.sub, provider, account, now).await?;
    store.delete(&key).await?;
    if !connected {
        warn!(provider = %provider, user = %user.sub, "OAuth callback for unknown user");
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(provider = %provider, user = %user.sub, "Ride account connected");
    Ok(())
}

/// `None` when the provider's `expires_in` is out of range.
fn token_expiry(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(expires_in).and_then(|ttl| now.checked_add_signed(ttl))
}

fn estimate_request(
    config: &ProviderConfig,
    provider: Provider,
    trip: &Trip,
    token: &str,
) -> Result<UpstreamRequest> {
    match provider {
        Provider::Uber => {
            let url = Url::parse_with_params(
                &format!("{}/v1.2/estimates/price", config.api_base),
                &[
                    ("start_latitude", trip.start_latitude.to_string()),
                    ("start_longitude", trip.start_longitude.to_string()),
                    ("end_latitude", trip.end_latitude.to_string()),
                    ("end_longitude", trip.end_longitude.to_string()),
                ],
            )
            .map_err(|e| ApiError::ConfigError(format!("Invalid Uber API base: {}", e)))?;
            UpstreamRequest::get(url.to_string())
                .bearer(token)?
                .header("accept-language", "en_IN")?
                .header("content-type", "application/json")
        }
        Provider::Ola => {
            let body = json!({
                "pickup_lat": trip.start_latitude,
                "pickup_lng": trip.start_longitude,
                "drop_lat": trip.end_latitude,
                "drop_lng": trip.end_longitude,
            });
            ola_request(config, "/v1/products", body, token)
        }
    }
}

fn ola_request(
    config: &ProviderConfig,
    path: &str,
    body: Value,
    token: &str,
) -> Result<UpstreamRequest> {
    let mut request = UpstreamRequest::post(format!("{}{}", config.api_base, path), body.to_string())
        .bearer(token)?
        .header("content-type", "application/json")?;
    if let Some(app_token) = config.app_token.as_deref() {
        request = request.header("x-app-token", app_token)?;
    }
    Ok(request)
}

/// Normalizes a provider's estimate payload into `RideEstimate`s.
pub fn parse_estimates(provider: Provider, payload: &Value) -> Vec<RideEstimate> {
    let field = |v: &Value, key: &str| v.get(key).filter(|x| !x.is_null()).cloned();
    let surge = |v: &Value| {
        v.get("surge_multiplier")
            .and_then(Value::as_f64)
            .unwrap_or(1.0)
    };

    match provider {
        Provider::Uber => payload
            .get("prices")
            .and_then(Value::as_array)
            .map(|prices| {
                prices
                    .iter()
                    .map(|price| RideEstimate {
                        service: text(price.get("display_name")),
                        estimate: price
                            .get("estimate")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        low_estimate: field(price, "low_estimate"),
                        high_estimate: field(price, "high_estimate"),
                        currency_code: price
                            .get("currency_code")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        duration: field(price, "duration"),
                        distance: field(price, "distance"),
                        surge_multiplier: surge(price),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Provider::Ola => payload
            .get("categories")
            .and_then(Value::as_array)
            .map(|categories| {
                categories
                    .iter()
                    .map(|category| {
                        let fare = category.get("fare_breakup").cloned().unwrap_or(Value::Null);
                        let total = match fare.get("total_fare") {
                            Some(Value::Number(n)) => n.to_string(),
                            Some(Value::String(s)) => s.clone(),
                            _ => "N/A".to_string(),
                        };
                        RideEstimate {
                            service: text(category.get("display_name")),
                            estimate: Some(format!("₹{}", total)),
                            low_estimate: field(&fare, "minimum_fare"),
                            high_estimate: field(&fare, "maximum_fare"),
                            currency_code: Some("INR".to_string()),
                            duration: field(category, "eta"),
                            distance: field(category, "distance"),
                            surge_multiplier: surge(category),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub async fn estimate(
    state: &AppState,
    provider: Provider,
    user: &SessionClaims,
    trip: &Trip,
) -> Result<Vec<RideEstimate>> {
    let config = state.config.provider(provider);
    let token = UserRepository::new(state.store()?)
        .provider_token(&user.sub, provider)
        .await?;

    let payload: Value = state
        .upstream
        .send(estimate_request(config, provider, trip, &token)?)
        .await?
        .ensure_success("ride estimate")?
        .json()?;

    Ok(parse_estimates(provider, &payload))
}

/// Estimate wrapped the way `/estimate` returns it.
pub fn estimate_payload(provider: Provider, estimates: &[RideEstimate]) -> Value {
    json!({
        "success": true,
        "provider": provider,
        "estimates": estimates,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

pub async fn request_ride(
    state: &AppState,
    provider: Provider,
    user: &SessionClaims,
    body: &TripRequest,
) -> Result<Value> {
    let trip = body.trip()?;
    let product = body.product(provider)?;
    let config = state.config.provider(provider);
    let token = UserRepository::new(state.store()?)
        .provider_token(&user.sub, provider)
        .await?;

    let request = match provider {
        Provider::Uber => UpstreamRequest::post(
            format!("{}/v1.2/requests", config.api_base),
            json!({
                "start_latitude": trip.start_latitude,
                "start_longitude": trip.start_longitude,
                "end_latitude": trip.end_latitude,
                "end_longitude": trip.end_longitude,
                "product_id": product,
            })
            .to_string(),
        )
        .bearer(&token)?
        .header("content-type", "application/json")?,
        Provider::Ola => ola_request(
            config,
            "/v1/bookings",
            json!({
                "pickup_lat": trip.start_latitude,
                "pickup_lng": trip.start_longitude,
                "drop_lat": trip.end_latitude,
                "drop_lng": trip.end_longitude,
                "category": product,
            }),
            &token,
        )?,
    };

    let ride: Value = state
        .upstream
        .send(request)
        .await?
        .ensure_success("ride request")?
        .json()?;

    info!(provider = %provider, user = %user.sub, "Ride requested");
    Ok(ride_payload(provider, &ride))
}

fn ride_payload(provider: Provider, ride: &Value) -> Value {
    let pick = |key: &str| ride.get(key).cloned().unwrap_or(Value::Null);
    match provider {
        Provider::Uber => json!({
            "success": true,
            "provider": provider,
            "request_id": pick("request_id"),
            "status": pick("status"),
            "eta": pick("eta"),
            "driver": pick("driver"),
            "vehicle": pick("vehicle"),
            "location": pick("location"),
        }),
        Provider::Ola => json!({
            "success": true,
            "provider": provider,
            "booking_id": pick("booking_id"),
            "status": pick("status"),
            "eta": pick("eta"),
            "driver": pick("driver_details"),
            "vehicle": pick("vehicle_details"),
            "otp": pick("otp"),
        }),
    }
}

/// Estimates from every provider; a failing provider is reported in place
/// instead of failing the comparison.
pub async fn compare(state: &AppState, user: &SessionClaims, trip: &Trip) -> Value {
    let (uber, ola) = tokio::join!(
        estimate(state, Provider::Uber, user, trip),
        estimate(state, Provider::Ola, user, trip),
    );

    let mut providers = Map::new();
    for (provider, result) in [(Provider::Uber, uber), (Provider::Ola, ola)] {
        let entry = match result {
            Ok(estimates) => estimate_payload(provider, &estimates),
            Err(e) => {
                warn!(provider = %provider, error = %e, "Estimate unavailable for comparison");
                json!({ "error": format!("{} estimates unavailable", provider.display_name()) })
            }
        };
        providers.insert(provider.as_str().to_string(), entry);
    }

    json!({
        "success": true,
        "timestamp": Utc::now().to_rfc3339(),
        "providers": providers,
    })
}
