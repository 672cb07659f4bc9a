use crate::config::SecretSource;
use worker::{kv::KvStore, send::SendWrapper, Env};

/// Worker bindings are `!Send`; the runtime is single threaded, so the
/// wrapper only has to satisfy axum's bounds.
#[derive(Clone)]
pub struct WorkerEnv(SendWrapper<Env>);

impl WorkerEnv {
    pub fn new(env: Env) -> Self {
        WorkerEnv(SendWrapper::new(env))
    }

    pub fn kv(&self, binding: &str) -> Option<KvStore> {
        self.0.kv(binding).ok()
    }
}

impl SecretSource for WorkerEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        self.0
            .secret(name)
            .ok()
            .map(|secret| secret.to_string())
            .or_else(|| self.0.var(name).ok().map(|var| var.to_string()))
    }
}
