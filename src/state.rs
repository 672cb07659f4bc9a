use crate::{
    config::Config,
    env_wrapper::WorkerEnv,
    error::{ApiError, Result},
    proxy::{FetchUpstream, Upstream},
    storage::{
        cloudflare::{CloudflareKv, USER_DATA_BINDING},
        KvStore,
    },
};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Option<Arc<dyn KvStore>>,
    pub upstream: Arc<dyn Upstream>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Option<Arc<dyn KvStore>>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        AppState {
            config: Arc::new(config),
            store,
            upstream,
        }
    }

    pub fn from_worker_env(env: &WorkerEnv, config: Config) -> Self {
        let store = env
            .kv(USER_DATA_BINDING)
            .map(|kv| Arc::new(CloudflareKv::new(kv)) as Arc<dyn KvStore>);
        if store.is_none() {
            warn!(binding = USER_DATA_BINDING, "KV binding missing; user data disabled");
        }
        AppState::new(config, store, Arc::new(FetchUpstream))
    }

    /// User store, or a 501 when the KV namespace is not bound.
    pub fn store(&self) -> Result<&dyn KvStore> {
        self.store.as_deref().ok_or_else(|| {
            ApiError::not_configured(
                "User data store not configured",
                format!("Bind a KV namespace as {}", USER_DATA_BINDING),
            )
        })
    }
}
