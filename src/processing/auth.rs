use crate::{
    crypto::token::{self, SessionClaims, SESSION_TTL_SECS},
    error::{ApiError, Result},
    proxy::UpstreamRequest,
    state::AppState,
};
use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

pub const AUTH_COOKIE: &str = "auth_token";
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Claims returned by Google's `tokeninfo` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdentity {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub aud: String,
}

#[derive(Deserialize)]
struct TokenInfo {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    identity: Option<GoogleIdentity>,
}

pub async fn verify_google_credential(state: &AppState, credential: &str) -> Result<GoogleIdentity> {
    let client_id = state.config.google_client_id.as_deref().ok_or_else(|| {
        ApiError::ConfigError("Missing GOOGLE_CLIENT_ID secret in Worker env".into())
    })?;

    let url = url::Url::parse_with_params(GOOGLE_TOKENINFO_URL, &[("id_token", credential)])
        .map_err(|e| ApiError::Internal(format!("Failed to build tokeninfo URL: {}", e)))?;
    let response = state
        .upstream
        .send(UpstreamRequest::get(url.to_string()))
        .await?;

    let invalid = || ApiError::Unauthorized("Invalid Google token".into());
    let info: TokenInfo = response.json().map_err(|_| invalid())?;
    if let Some(error) = info.error {
        warn!(error = %error, "Google rejected credential");
        return Err(invalid());
    }
    let identity = info.identity.ok_or_else(invalid)?;
    if identity.aud != client_id {
        warn!(aud = %identity.aud, "Google credential issued for another client");
        return Err(invalid());
    }

    Ok(identity)
}

pub fn issue_session(state: &AppState, identity: &GoogleIdentity) -> Result<String> {
    let claims = SessionClaims::new(&identity.sub, &identity.email, &identity.name, Utc::now());
    token::issue(&claims, state.config.jwt_secret()?)
}

pub fn verify_session(state: &AppState, token: &str) -> Result<SessionClaims> {
    token::verify(token, state.config.jwt_secret()?, Utc::now())
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Max-Age={}; Path=/",
        AUTH_COOKIE, token, SESSION_TTL_SECS
    )
}

pub fn cleared_cookie() -> String {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Strict; Max-Age=0; Path=/",
        AUTH_COOKIE
    )
}

/// First cookie named `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
