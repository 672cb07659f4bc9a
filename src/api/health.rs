use crate::{
    monitoring::{health_status, HealthStatus},
    state::AppState,
};
use axum::{extract::State, Json};

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(health_status(&state))
}
