// Session tokens: HS256 JWTs signed with JWT_SECRET
use crate::error::{ApiError, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(sub: &str, email: &str, name: &str, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        SessionClaims {
            sub: sub.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            iat,
            exp: iat + SESSION_TTL_SECS,
        }
    }
}

pub fn issue(claims: &SessionClaims, secret: &str) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign session token: {}", e)))
}

/// Checks signature and expiry. `now` is passed in because the library's
/// own clock reads `SystemTime`, which is unavailable on wasm32.
pub fn verify(token: &str, secret: &str, now: DateTime<Utc>) -> Result<SessionClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

    if data.claims.exp <= now.timestamp() {
        return Err(ApiError::Unauthorized("Token expired".into()));
    }

    Ok(data.claims)
}
