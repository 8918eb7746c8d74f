//! Cache layer: storage for computed step values.
//!
//! Values are stored as bytes under a structural [`CacheKey`]. The executor
//! decides what is eligible and encodes values with a
//! [`Codec`](crate::core::Codec); backends only move bytes.
//!
//! - [`InMemoryCache`]: process-local, `DashMap`-backed, with locking
//! - [`FileCache`]: one file per key under a directory, with lock files
//! - [`StepCache`]: routes each step to its own backend with a fallback
//!
//! # Example
//!
//! ```
//! use hodos::cache::{Cache, InMemoryCache};
//! use hodos::CacheKey;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = InMemoryCache::new();
//! let key = CacheKey::new("step1", "option1", vec![]);
//! cache.store(&key, b"value").await?;
//! assert_eq!(cache.lookup(&key).await?, Some(b"value".to_vec()));
//! # Ok(())
//! # }
//! ```

use crate::graph::{CacheKey, OptionId, StepId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

mod error;
pub mod file;
pub mod memory;
mod policy;
pub mod step;

pub use error::{CacheError, Result};
pub use file::FileCache;
pub use memory::InMemoryCache;
pub use policy::{CacheReset, CacheRule, Eligibility};
pub use step::StepCache;

/// Proof of lock ownership, checked on release.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockToken(Uuid);

impl LockToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockToken({})", self.0)
    }
}

/// Outcome of a single lock attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired(LockToken),
    /// Another worker holds the lock
    Held,
}

/// Trait for cache backends.
///
/// Implementations must be safe to share between concurrent workers. A
/// `store` must become visible to other workers atomically: a concurrent
/// `lookup` sees either nothing or the complete value.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the bytes stored under `key`, if any.
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn store(&self, key: &CacheKey, value: &[u8]) -> Result<()>;

    async fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lookup(key).await?.is_some())
    }

    /// Removes one entry. Returns whether it existed.
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Removes every entry computed for `step`, optionally only for one
    /// option. Returns the number of entries removed.
    async fn delete_step(&self, step: &StepId, option: Option<&OptionId>) -> Result<usize>;

    /// All keys currently stored.
    async fn keys(&self) -> Result<Vec<CacheKey>>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;

    /// Whether [`acquire`](Self::acquire) and [`release`](Self::release)
    /// are implemented.
    fn supports_locking(&self) -> bool {
        false
    }

    /// Attempts once to take the lock for `key` without waiting.
    ///
    /// # Default Implementation
    ///
    /// Returns `CacheError::Unsupported`.
    async fn acquire(&self, key: &CacheKey) -> Result<Acquire> {
        let _ = key;
        Err(CacheError::Unsupported(
            "locking not implemented for this cache backend".to_string(),
        ))
    }

    /// Releases a lock taken with [`acquire`](Self::acquire).
    ///
    /// Releasing with a token that no longer owns the lock is a no-op.
    ///
    /// # Default Implementation
    ///
    /// Returns `CacheError::Unsupported`.
    async fn release(&self, key: &CacheKey, token: LockToken) -> Result<()> {
        let _ = (key, token);
        Err(CacheError::Unsupported(
            "locking not implemented for this cache backend".to_string(),
        ))
    }
}

#[async_trait]
impl<C: Cache + ?Sized> Cache for Arc<C> {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        (**self).lookup(key).await
    }

    async fn store(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        (**self).store(key, value).await
    }

    async fn contains(&self, key: &CacheKey) -> Result<bool> {
        (**self).contains(key).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        (**self).delete(key).await
    }

    async fn delete_step(&self, step: &StepId, option: Option<&OptionId>) -> Result<usize> {
        (**self).delete_step(step, option).await
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        (**self).keys().await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }

    fn supports_locking(&self) -> bool {
        (**self).supports_locking()
    }

    async fn acquire(&self, key: &CacheKey) -> Result<Acquire> {
        (**self).acquire(key).await
    }

    async fn release(&self, key: &CacheKey, token: LockToken) -> Result<()> {
        (**self).release(key, token).await
    }
}

/// True if `key` was computed for `step` (and `option`, when given)
pub(crate) fn key_matches(key: &CacheKey, step: &StepId, option: Option<&OptionId>) -> bool {
    key.step() == step && option.map_or(true, |option| key.option() == option)
}
