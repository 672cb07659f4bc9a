use crate::{
    api::parse_json,
    error::{ApiError, Result},
    meta::user::UserSummary,
    processing::{
        auth::{
            cleared_cookie, cookie_value, issue_session, session_cookie,
            verify_google_credential, verify_session, AUTH_COOKIE,
        },
        users::UserRepository,
    },
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Deserialize)]
struct GoogleLogin {
    #[serde(default)]
    credential: Option<String>,
}

pub async fn dispatch(
    State(state): State<AppState>,
    Path(action): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    match action.as_str() {
        "google" => google_login(&state, method, &body).await,
        "logout" => Ok(logout()),
        "verify" => verify(&state, &headers),
        _ => Err(ApiError::BadRequest(
            "Unknown auth action. Use: google | logout | verify".into(),
        )),
    }
}

async fn google_login(state: &AppState, method: Method, body: &[u8]) -> Result<Response> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }
    state.config.jwt_secret()?;

    let login: GoogleLogin = parse_json(body)?;
    let credential = login
        .credential
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing Google credential".into()))?;

    let identity = verify_google_credential(state, &credential).await?;
    let token = issue_session(state, &identity)?;

    let user = match &state.store {
        Some(store) => {
            let record = UserRepository::new(store.as_ref())
                .upsert_from_identity(&identity, Utc::now())
                .await?;
            UserSummary::from(&record)
        }
        None => {
            warn!(user = %identity.sub, "Signed in without a user store");
            UserSummary {
                id: identity.sub.clone(),
                email: identity.email.clone(),
                name: identity.name.clone(),
                picture: identity.picture.clone(),
            }
        }
    };

    info!(user = %user.id, "User signed in");
    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(json!({ "success": true, "user": user })),
    )
        .into_response())
}

fn logout() -> Response {
    (
        [(header::SET_COOKIE, cleared_cookie())],
        Json(json!({ "success": true })),
    )
        .into_response()
}

fn verify(state: &AppState, headers: &HeaderMap) -> Result<Response> {
    let token = cookie_value(headers, AUTH_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("No auth token".into()))?;
    let claims = match verify_session(state, token) {
        Ok(claims) => claims,
        Err(ApiError::Unauthorized(_)) => {
            return Err(ApiError::Unauthorized("Invalid token".into()))
        }
        Err(e) => return Err(e),
    };
    Ok(Json(json!({ "success": true, "user": claims })).into_response())
}
