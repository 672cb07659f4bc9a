use crate::{
    api::{auth, cors, google, gtfs, health, portal, rides, user},
    error::ApiError,
    monitoring,
    state::AppState,
};
use axum::{
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Router,
};

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", any(portal::redirect_root))
        .route("/api/health", get(health::health))
        .route("/api/auth/:action", any(auth::dispatch))
        .route("/api/user/:action", any(user::dispatch))
        .route("/api/rides/compare", post(rides::compare))
        .route("/api/rides/:provider/:action", any(rides::dispatch))
        .route("/api/gtfs", get(gtfs::feed))
        .route("/api/gtfs/", get(gtfs::feed))
        .route("/api/gtfs/*rest", get(gtfs::feed))
        .route("/api/google/:service", get(google::proxy))
        .route("/portal", any(portal::proxy))
        .route("/portal/", any(portal::proxy))
        .route("/portal/*path", any(portal::proxy))
        .fallback(not_found)
        .layer(middleware::from_fn(cors::cors))
        .layer(middleware::from_fn(monitoring::track_request))
        .with_state(state)
}

async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/api/") {
        ApiError::NotFound("API endpoint not found".into()).into_response()
    } else {
        (StatusCode::NOT_FOUND, "Not Found").into_response()
    }
}
