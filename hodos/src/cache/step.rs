use super::{Acquire, Cache, LockToken, Result};
use crate::graph::{CacheKey, OptionId, StepId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes each step to its own backend, with an optional fallback.
///
/// Steps with no route and no fallback are simply not cached: lookups miss,
/// stores are dropped, and locks are granted without contention.
#[derive(Clone, Default)]
pub struct StepCache {
    routes: HashMap<StepId, Arc<dyn Cache>>,
    fallback: Option<Arc<dyn Cache>>,
}

impl StepCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends every step without a dedicated route to `cache`
    pub fn with_fallback(mut self, cache: Arc<dyn Cache>) -> Self {
        self.fallback = Some(cache);
        self
    }

    pub fn route(mut self, step: impl Into<StepId>, cache: Arc<dyn Cache>) -> Self {
        self.routes.insert(step.into(), cache);
        self
    }

    fn backend(&self, step: &StepId) -> Option<&Arc<dyn Cache>> {
        self.routes.get(step).or(self.fallback.as_ref())
    }

    fn backends(&self) -> impl Iterator<Item = &Arc<dyn Cache>> {
        self.routes.values().chain(self.fallback.as_ref())
    }
}

#[async_trait]
impl Cache for StepCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        match self.backend(key.step()) {
            Some(cache) => cache.lookup(key).await,
            None => Ok(None),
        }
    }

    async fn store(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        match self.backend(key.step()) {
            Some(cache) => cache.store(key, value).await,
            None => {
                debug!(key = %key, "no cache routed for step, value dropped");
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        match self.backend(key.step()) {
            Some(cache) => cache.delete(key).await,
            None => Ok(false),
        }
    }

    async fn delete_step(&self, step: &StepId, option: Option<&OptionId>) -> Result<usize> {
        match self.backend(step) {
            Some(cache) => cache.delete_step(step, option).await,
            None => Ok(0),
        }
    }

    /// Keys from every backend that belong to the step routed there
    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for (step, cache) in &self.routes {
            keys.extend(cache.keys().await?.into_iter().filter(|key| key.step() == step));
        }
        if let Some(fallback) = &self.fallback {
            keys.extend(
                fallback
                    .keys()
                    .await?
                    .into_iter()
                    .filter(|key| !self.routes.contains_key(key.step())),
            );
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        for cache in self.backends() {
            cache.clear().await?;
        }
        Ok(())
    }

    fn supports_locking(&self) -> bool {
        self.backends().all(|cache| cache.supports_locking())
    }

    async fn acquire(&self, key: &CacheKey) -> Result<Acquire> {
        match self.backend(key.step()) {
            Some(cache) => cache.acquire(key).await,
            None => Ok(Acquire::Acquired(LockToken::new())),
        }
    }

    async fn release(&self, key: &CacheKey, token: LockToken) -> Result<()> {
        match self.backend(key.step()) {
            Some(cache) => cache.release(key, token).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;

    fn key(step: &str) -> CacheKey {
        CacheKey::new(step, "o", vec![])
    }

    #[tokio::test]
    async fn test_routes_by_step() {
        let heavy = Arc::new(InMemoryCache::new());
        let rest = Arc::new(InMemoryCache::new());
        let cache = StepCache::new()
            .route("train", heavy.clone())
            .with_fallback(rest.clone());

        cache.store(&key("train"), b"model").await.unwrap();
        cache.store(&key("score"), b"0.9").await.unwrap();

        assert_eq!(heavy.len(), 1);
        assert_eq!(rest.len(), 1);
        assert_eq!(cache.lookup(&key("train")).await.unwrap(), Some(b"model".to_vec()));
        assert_eq!(cache.keys().await.unwrap(), vec![key("score"), key("train")]);
    }

    #[tokio::test]
    async fn test_unrouted_steps_are_not_cached() {
        let cache = StepCache::new().route("train", Arc::new(InMemoryCache::new()));
        cache.store(&key("score"), b"0.9").await.unwrap();
        assert_eq!(cache.lookup(&key("score")).await.unwrap(), None);

        let token = match cache.acquire(&key("score")).await.unwrap() {
            Acquire::Acquired(token) => token,
            Acquire::Held => panic!("unrouted steps never contend"),
        };
        cache.release(&key("score"), token).await.unwrap();
    }
}
