use crate::{
    api::{parse_json, Session},
    error::{ApiError, Result},
    processing::users::UserRepository,
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Method,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteLocation {
    location_id: Option<String>,
}

pub async fn dispatch(
    State(state): State<AppState>,
    Session(user): Session,
    Path(action): Path<String>,
    method: Method,
    body: Bytes,
) -> Result<Json<Value>> {
    if !matches!(action.as_str(), "profile" | "preferences" | "locations") {
        return Err(ApiError::BadRequest(
            "Unknown user action. Use: profile | preferences | locations".into(),
        ));
    }
    let users = UserRepository::new(state.store()?);
    let now = Utc::now();

    match (action.as_str(), method) {
        ("profile", Method::GET) => {
            let record = users.get(&user.sub).await?;
            Ok(Json(json!({ "success": true, "user": record })))
        }
        ("profile", Method::PUT) => {
            let updates: Map<String, Value> = parse_json(&body)?;
            let record = users
                .update_profile(&user.sub, updates, now)
                .await?
                .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
            Ok(Json(json!({ "success": true, "user": record })))
        }
        ("preferences", Method::GET) => {
            let preferences = users.preferences(&user.sub).await?;
            Ok(Json(json!({ "success": true, "preferences": preferences })))
        }
        ("preferences", Method::PUT) => {
            let patch: Map<String, Value> = parse_json(&body)?;
            if !users.update_preferences(&user.sub, patch, now).await? {
                return Err(ApiError::NotFound("User not found".into()));
            }
            Ok(Json(json!({ "success": true })))
        }
        ("locations", Method::GET) => {
            let locations = users.locations(&user.sub).await?;
            Ok(Json(json!({ "success": true, "locations": locations })))
        }
        ("locations", Method::POST) | ("locations", Method::PUT) => {
            let fields: Map<String, Value> = parse_json(&body)?;
            let location = users
                .add_location(&user.sub, fields, now)
                .await?
                .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
            Ok(Json(json!({ "success": true, "location": location })))
        }
        ("locations", Method::DELETE) => {
            let request: DeleteLocation = parse_json(&body)?;
            let location_id = request
                .location_id
                .ok_or_else(|| ApiError::BadRequest("Missing locationId".into()))?;
            let removed = users
                .delete_location(&user.sub, &location_id, now)
                .await?
                .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
            Ok(Json(json!({ "success": true, "removed": removed })))
        }
        _ => Err(ApiError::MethodNotAllowed),
    }
}
