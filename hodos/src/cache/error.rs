use crate::core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Cache backend error type.
///
/// Wraps I/O and serialization failures while preserving the error chain.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A key or envelope could not be (de)serialized.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A stored entry exists but cannot be read back.
    #[error("corrupt cache entry {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Another worker held the lock for longer than the wait policy allows.
    #[error("lock on {key} still held after {attempts} attempts")]
    LockTimeout { key: String, attempts: u32 },

    /// The backend does not implement the requested operation.
    #[error("unsupported cache operation: {0}")]
    Unsupported(String),
}

impl CacheError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_keeps_cause() {
        let err = CacheError::from(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.to_string(), "I/O error: denied");
    }
}
