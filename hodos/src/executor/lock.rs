//! Per-key compute locks
//!
//! A worker that finds an eligible key missing takes the key's lock before
//! computing it, so concurrent paths sharing a prefix compute it once. The
//! lock is polled with [`RetryPolicy`] backoff; running out of attempts is a
//! [`CacheError::LockTimeout`].

use crate::cache::{Acquire, Cache, CacheError, LockToken};
use crate::core::RetryPolicy;
use crate::graph::CacheKey;
use std::sync::Arc;
use tracing::{debug, warn};

/// A held lock. Released explicitly, or in the background when dropped.
pub(crate) struct LockGuard {
    cache: Arc<dyn Cache>,
    key: CacheKey,
    token: Option<LockToken>,
}

impl LockGuard {
    pub(crate) async fn acquire(
        cache: Arc<dyn Cache>,
        key: &CacheKey,
        policy: &RetryPolicy,
    ) -> Result<Self, CacheError> {
        let mut attempt = 1;
        loop {
            match cache.acquire(key).await? {
                Acquire::Acquired(token) => {
                    debug!(key = %key, attempt, "lock acquired");
                    return Ok(Self {
                        cache,
                        key: key.clone(),
                        token: Some(token),
                    });
                }
                Acquire::Held => match policy.delay_for_attempt(attempt) {
                    Some(delay) => {
                        debug!(key = %key, attempt, delay_ms = delay.as_millis() as u64, "lock held, waiting");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(key = %key, attempts = attempt, "gave up waiting for lock");
                        return Err(CacheError::LockTimeout {
                            key: key.to_string(),
                            attempts: attempt,
                        });
                    }
                },
            }
        }
    }

    pub(crate) async fn release(mut self) -> Result<(), CacheError> {
        match self.token.take() {
            Some(token) => self.cache.release(&self.key, token).await,
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = Arc::clone(&self.cache);
                let key = self.key.clone();
                handle.spawn(async move {
                    if let Err(e) = cache.release(&key, token).await {
                        warn!(key = %key, error = %e, "failed to release dropped lock");
                    }
                });
            }
            Err(_) => warn!(key = %self.key, "lock dropped outside a runtime, left held"),
        }
    }
}
