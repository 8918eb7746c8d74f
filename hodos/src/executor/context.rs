//! State shared by every path of one execute call

use super::error::{ExecutionError, Result};
use super::lock::LockGuard;
use super::plan::Plan;
use super::result::ExecutionStats;
use crate::cache::{Cache, Eligibility};
use crate::config::ExecutorConfig;
use crate::core::{Codec, RetryPolicy, Value};
use crate::graph::{CacheKey, Path, StepContext, StepId, StepOption};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Default)]
struct Counters {
    computed: AtomicUsize,
    hits: AtomicUsize,
    stores: AtomicUsize,
}

pub(crate) struct RunContext {
    cache: Option<Arc<dyn Cache>>,
    codec: Codec,
    eligibility: Eligibility,
    locking: bool,
    lock_retry: RetryPolicy,
    offload: bool,
    /// Reset keys already recomputed in this call
    refreshed: Mutex<HashSet<CacheKey>>,
    counters: Counters,
}

impl RunContext {
    pub(crate) fn new(
        cache: Option<Arc<dyn Cache>>,
        config: &ExecutorConfig,
        eligibility: Eligibility,
    ) -> Self {
        let locking = config.locking && cache.as_ref().is_some_and(|c| c.supports_locking());
        Self {
            cache,
            codec: config.codec,
            eligibility,
            locking,
            lock_retry: config.lock_retry,
            offload: config.max_concurrency > 1,
            refreshed: Mutex::new(HashSet::new()),
            counters: Counters::default(),
        }
    }

    fn eligible(&self, key: &CacheKey) -> bool {
        self.cache.is_some() && self.eligibility.is_eligible(key.step(), key.option())
    }

    fn must_refresh(&self, key: &CacheKey) -> bool {
        self.eligibility.is_reset(key.step(), key.option())
            && !self
                .refreshed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(key)
    }

    /// Reads an eligible key, treating keys still awaiting a reset as misses
    pub(crate) async fn lookup<T: Value>(&self, key: &CacheKey) -> Result<Option<T>> {
        if !self.eligible(key) {
            return Ok(None);
        }
        if self.must_refresh(key) {
            debug!(key = %key, "cache reset, recomputing");
            return Ok(None);
        }
        self.read(key).await
    }

    /// Reads a key regardless of eligibility and reset
    pub(crate) async fn read<T: Value>(&self, key: &CacheKey) -> Result<Option<T>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        match cache.lookup(key).await? {
            Some(bytes) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "cache hit");
                Ok(Some(self.codec.decode(&bytes)?))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn store<T: Value>(&self, key: &CacheKey, value: &T) -> Result<()> {
        let Some(cache) = self.cache.as_ref().filter(|_| self.eligible(key)) else {
            return Ok(());
        };
        let bytes = self.codec.encode(value)?;
        cache.store(key, &bytes).await?;
        self.refreshed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, bytes = bytes.len(), "stored");
        Ok(())
    }

    async fn lock(&self, key: &CacheKey) -> Result<Option<LockGuard>> {
        match &self.cache {
            Some(cache) if self.locking && self.eligible(key) => {
                Ok(Some(LockGuard::acquire(Arc::clone(cache), key, &self.lock_retry).await?))
            }
            _ => Ok(None),
        }
    }

    /// Runs one transform, on a blocking worker when running concurrently
    async fn transform<T: Value>(&self, option: StepOption<T>, inputs: Vec<T>, ctx: StepContext) -> Result<T> {
        self.counters.computed.fetch_add(1, Ordering::Relaxed);
        let (step, option_id, prefix) = (ctx.step().clone(), ctx.option().clone(), ctx.prefix().clone());
        debug!(step = %step, option = %option_id, "computing");

        let outcome = if self.offload {
            tokio::task::spawn_blocking(move || {
                option.apply(&inputs, &ctx).map_err(|e| e.to_string())
            })
            .await?
        } else {
            option.apply(&inputs, &ctx).map_err(|e| e.to_string())
        };
        outcome.map_err(|message| ExecutionError::transform(&step, &option_id, prefix, message))
    }

    async fn compute<T: Value>(
        &self,
        key: &CacheKey,
        option: StepOption<T>,
        inputs: Vec<T>,
        ctx: StepContext,
    ) -> Result<T> {
        let value = self.transform(option, inputs, ctx).await?;
        self.store(key, &value).await?;
        Ok(value)
    }

    /// Produces the value of `step` on `path` from its parents' values.
    ///
    /// Under locking the key is looked up again once the lock is held,
    /// since the previous holder has usually just stored it.
    pub(crate) async fn evaluate<T: Value>(
        &self,
        plan: &Plan<'_, T>,
        step: &StepId,
        path: &Path,
        key: &CacheKey,
        inputs: Vec<T>,
    ) -> Result<T> {
        let (option_id, option) = plan.option(step, path)?;
        let ctx = StepContext::new(step.clone(), option_id, key.to_path());

        let Some(guard) = self.lock(key).await? else {
            return self.compute(key, option, inputs, ctx).await;
        };
        if let Some(value) = self.lookup(key).await? {
            guard.release().await?;
            return Ok(value);
        }
        let outcome = self.compute(key, option, inputs, ctx).await;
        let released = guard.release().await;
        let value = outcome?;
        released?;
        Ok(value)
    }

    pub(crate) fn stats(&self, paths: usize, failed: usize) -> ExecutionStats {
        ExecutionStats {
            paths,
            failed,
            computed: self.counters.computed.load(Ordering::Relaxed),
            cache_hits: self.counters.hits.load(Ordering::Relaxed),
            cache_stores: self.counters.stores.load(Ordering::Relaxed),
        }
    }
}
