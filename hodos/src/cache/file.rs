//! Persistent cache backend storing one file per key.
//!
//! # Layout
//!
//! ```text
//! <root>/<step-hash>-<option-hash>-<key-hash>.entry   value envelope (JSON)
//! <root>/<step-hash>-<option-hash>-<key-hash>.lock    lock token while held
//! ```
//!
//! Hashes are SeaHash over the canonical JSON of the step ID, option ID and
//! full key, so file names are stable across processes and machines and
//! every entry of a step can be found by file name alone. The envelope keeps
//! the full key next to the base64 payload, which guards against hash
//! collisions and lets [`Cache::keys`] recover keys from disk.
//!
//! Writes go to a uniquely named temporary file that is then renamed over
//! the entry, so a reader never observes a partial value.

use super::{key_matches, Acquire, Cache, CacheError, LockToken, Result};
use crate::core::{deserialize_value, hash_value, serialize_value};
use crate::graph::{CacheKey, OptionId, StepId};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

const ENTRY_EXT: &str = "entry";
const LOCK_EXT: &str = "lock";

#[derive(Serialize, Deserialize)]
struct Envelope {
    key: CacheKey,
    value: String,
}

/// Cache stored as files under a directory, shareable between processes.
///
/// Lock files left behind by a crashed process keep their key locked until
/// removed. With [`with_stale_lock_after`](Self::with_stale_lock_after) a
/// lock file older than the given age is taken over instead.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
    stale_lock_after: Option<Duration>,
}

impl FileCache {
    /// Uses `root` as the cache directory, creating it on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stale_lock_after: None,
        }
    }

    /// Treats lock files older than `age` as abandoned
    pub fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_after = Some(age);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn step_prefix(step: &StepId, option: Option<&OptionId>) -> Result<String> {
        let step_hash = hash_value(step)?;
        Ok(match option {
            Some(option) => format!("{step_hash:016x}-{:016x}-", hash_value(option)?),
            None => format!("{step_hash:016x}-"),
        })
    }

    fn stem(key: &CacheKey) -> Result<String> {
        Ok(format!(
            "{}{:016x}",
            Self::step_prefix(key.step(), Some(key.option()))?,
            key.digest()?
        ))
    }

    fn entry_path(&self, key: &CacheKey) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}.{ENTRY_EXT}", Self::stem(key)?)))
    }

    fn lock_path(&self, key: &CacheKey) -> Result<PathBuf> {
        Ok(self.root.join(format!("{}.{LOCK_EXT}", Self::stem(key)?)))
    }

    /// Entry files whose names start with `prefix`
    async fn entry_files(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_entry = path.extension().is_some_and(|ext| ext == ENTRY_EXT);
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix));
            if is_entry && matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_envelope(path: &Path) -> Result<Option<Envelope>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        deserialize_value(&bytes)
            .map(Some)
            .map_err(|e| CacheError::corrupt(path, e.to_string()))
    }

    /// Whether the lock file at `path` has outlived the configured age
    async fn is_stale(&self, path: &Path) -> bool {
        let Some(limit) = self.stale_lock_after else {
            return false;
        };
        match fs::metadata(path).await.and_then(|meta| meta.modified()) {
            Ok(modified) => modified.elapsed().unwrap_or_default() >= limit,
            Err(_) => false,
        }
    }

    /// Writes `token` into a freshly created lock file. On failure the file
    /// is removed again, since no worker holds its token.
    async fn write_token(path: &Path, mut file: fs::File, token: &LockToken) -> Result<()> {
        let written = async {
            file.write_all(token.as_uuid().to_string().as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            if let Err(cleanup) = Self::remove_if_exists(path).await {
                warn!(path = %path.display(), error = %cleanup, "failed to remove unwritten lock file");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove_if_exists(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key)?;
        let Some(envelope) = Self::read_envelope(&path).await? else {
            return Ok(None);
        };
        if envelope.key != *key {
            warn!(key = %key, stored = %envelope.key, "cache file name collision");
            return Ok(None);
        }
        BASE64
            .decode(envelope.value)
            .map(Some)
            .map_err(|e| CacheError::corrupt(&path, e.to_string()))
    }

    async fn store(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        let path = self.entry_path(key)?;
        let envelope = Envelope {
            key: key.clone(),
            value: BASE64.encode(value),
        };
        let bytes = serialize_value(&envelope)?;

        let tmp = self
            .root
            .join(format!("{}.tmp-{}", Self::stem(key)?, Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(key = %key, path = %path.display(), bytes = value.len(), "stored cache file");
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Self::remove_if_exists(&self.entry_path(key)?).await
    }

    async fn delete_step(&self, step: &StepId, option: Option<&OptionId>) -> Result<usize> {
        let prefix = Self::step_prefix(step, option)?;
        let mut removed = 0;
        for path in self.entry_files(&prefix).await? {
            // Hash prefixes can collide; confirm against the stored key.
            match Self::read_envelope(&path).await {
                Ok(Some(envelope)) if !key_matches(&envelope.key, step, option) => continue,
                Ok(None) => continue,
                _ => {}
            }
            if Self::remove_if_exists(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for path in self.entry_files("").await? {
            match Self::read_envelope(&path).await {
                Ok(Some(envelope)) => keys.push(envelope.key),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable cache file"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        for path in self.entry_files("").await? {
            Self::remove_if_exists(&path).await?;
        }
        Ok(())
    }

    fn supports_locking(&self) -> bool {
        true
    }

    async fn acquire(&self, key: &CacheKey) -> Result<Acquire> {
        fs::create_dir_all(&self.root).await?;
        let path = self.lock_path(key)?;
        let mut took_over = false;
        let file = loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if took_over || !self.is_stale(&path).await {
                        return Ok(Acquire::Held);
                    }
                    warn!(key = %key, "taking over stale lock file");
                    Self::remove_if_exists(&path).await?;
                    took_over = true;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let token = LockToken::new();
        Self::write_token(&path, file, &token).await?;
        Ok(Acquire::Acquired(token))
    }

    async fn release(&self, key: &CacheKey, token: LockToken) -> Result<()> {
        let path = self.lock_path(key)?;
        let holder = match fs::read_to_string(&path).await {
            Ok(holder) => holder,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(key = %key, "released a lock file that no longer exists");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if holder.trim() == token.as_uuid().to_string() {
            Self::remove_if_exists(&path).await?;
        } else {
            warn!(key = %key, "lock file is owned by another worker");
        }
        Ok(())
    }
}
