use super::{key_matches, Acquire, Cache, LockToken, Result};
use crate::graph::{CacheKey, OptionId, StepId};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::warn;

/// In-process cache using DashMap for concurrent access.
///
/// DashMap shards its locking, so workers storing different keys do not
/// contend on a single mutex. Locks live in a second map keyed the same
/// way; the entry API makes acquisition a single atomic check-and-insert.
///
/// Suitable for one process only. Use [`FileCache`](super::FileCache) to
/// share values between processes.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<CacheKey, Vec<u8>>,
    locks: DashMap<CacheKey, LockToken>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of locks currently held
    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn store(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        self.entries.insert(key.clone(), value.to_vec());
        Ok(())
    }

    async fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.contains_key(key))
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_step(&self, step: &StepId, option: Option<&OptionId>) -> Result<usize> {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let doomed = key_matches(key, step, option);
            removed += usize::from(doomed);
            !doomed
        });
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn supports_locking(&self) -> bool {
        true
    }

    async fn acquire(&self, key: &CacheKey) -> Result<Acquire> {
        match self.locks.entry(key.clone()) {
            Entry::Occupied(_) => Ok(Acquire::Held),
            Entry::Vacant(slot) => {
                let token = LockToken::new();
                slot.insert(token);
                Ok(Acquire::Acquired(token))
            }
        }
    }

    async fn release(&self, key: &CacheKey, token: LockToken) -> Result<()> {
        if self
            .locks
            .remove_if(key, |_, holder| *holder == token)
            .is_none()
        {
            warn!(key = %key, "released a lock this worker no longer holds");
        }
        Ok(())
    }
}
