use crate::{
    api::{parse_json, request_origin, Session},
    error::{ApiError, Result},
    meta::{Provider, TripRequest},
    processing::rides,
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Uri},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

pub async fn dispatch(
    State(state): State<AppState>,
    Session(user): Session,
    Path((provider, action)): Path<(String, String)>,
    Query(params): Query<CallbackParams>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let provider = Provider::from_segment(&provider)
        .ok_or_else(|| ApiError::BadRequest("Unknown provider. Use: uber | ola".into()))?;
    let origin = request_origin(&uri, &headers);

    match action.as_str() {
        "connect" => {
            let auth_url = rides::connect(&state, provider, &user, &origin).await?;
            Ok(Json(json!({
                "success": true,
                "authUrl": auth_url.as_str(),
                "message": format!(
                    "Redirect user to this URL to connect {} account",
                    provider.display_name()
                ),
            })))
        }
        "callback" => {
            let (Some(code), Some(returned_state)) = (params.code, params.state) else {
                return Err(ApiError::BadRequest(
                    "Missing authorization code or state".into(),
                ));
            };
            rides::complete_callback(&state, provider, &user, &code, &returned_state, &origin)
                .await?;
            Ok(Json(json!({
                "success": true,
                "message": format!("{} account connected successfully", provider.display_name()),
            })))
        }
        "estimate" => {
            let request: TripRequest = parse_json(&body)?;
            let trip = request.trip()?;
            let estimates = rides::estimate(&state, provider, &user, &trip).await?;
            Ok(Json(rides::estimate_payload(provider, &estimates)))
        }
        "request" => {
            let request: TripRequest = parse_json(&body)?;
            Ok(Json(rides::request_ride(&state, provider, &user, &request).await?))
        }
        _ => Err(ApiError::BadRequest(format!(
            "Unknown {} action. Use: connect | callback | estimate | request",
            provider.display_name()
        ))),
    }
}

pub async fn compare(
    State(state): State<AppState>,
    Session(user): Session,
    body: Bytes,
) -> Result<Json<Value>> {
    let request: TripRequest = parse_json(&body)?;
    let trip = request.trip()?;
    Ok(Json(rides::compare(&state, &user, &trip).await))
}
