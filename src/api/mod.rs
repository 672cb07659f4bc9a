pub mod auth;
pub mod cors;
pub mod google;
pub mod gtfs;
pub mod health;
pub mod portal;
pub mod rides;
pub mod routes;
pub mod user;

use crate::{
    crypto::token::SessionClaims,
    error::{ApiError, Result},
    processing::auth::{cookie_value, verify_session, AUTH_COOKIE},
    state::AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, Uri},
};
use serde::de::DeserializeOwned;

/// Signed-in user, taken from the `auth_token` cookie.
pub struct Session(pub SessionClaims);

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = cookie_value(&parts.headers, AUTH_COOKIE)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;

        match verify_session(state, token) {
            Ok(claims) => Ok(Session(claims)),
            Err(ApiError::Unauthorized(_)) => {
                Err(ApiError::Unauthorized("Invalid authentication".into()))
            }
            Err(e) => Err(e),
        }
    }
}

/// `scheme://host` the client used; OAuth redirect URIs default to it.
pub fn request_origin(uri: &Uri, headers: &HeaderMap) -> String {
    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        return format!("{}://{}", scheme, authority);
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("https://{}", host)
}

pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("Invalid JSON body".into()))
}
