pub mod api;
pub mod config;
pub mod crypto;
pub mod env_wrapper;
pub mod error;
pub mod logging;
pub mod meta;
pub mod monitoring;
pub mod processing;
pub mod proxy;
pub mod state;
pub mod storage;

use config::Config;
use env_wrapper::WorkerEnv;
use state::AppState;
use std::sync::Arc;
use tower_service::Service;
use worker::{event, Context, Env, HttpRequest, Result};

#[event(fetch)]
pub async fn main(
    req: HttpRequest,
    env: Env,
    _ctx: Context,
) -> Result<axum::http::Response<axum::body::Body>> {
    console_error_panic_hook::set_once();

    let env = WorkerEnv::new(env);
    let config = Config::load(Arc::new(env.clone()));
    logging::init(&config.log_level);

    let state = AppState::from_worker_env(&env, config);
    Ok(api::routes::routes(state).call(req).await?)
}
