//! Foundation types shared by every other module.
//!
//! # Serialization
//! - [`Codec`]: byte encoding used for cached values (JSON or bincode)
//! - [`hash_bytes`] / [`hash_value`]: stable fingerprints for cache file names
//!
//! # Values
//! - [`Value`]: the bound every step value satisfies
//! - [`BoxError`]: the error type transforms return
//!
//! # Backoff
//! - [`RetryPolicy`]: how long to wait for a lock held by another worker

mod error;
pub mod retry;
mod serialization;
mod value;

pub use error::{CoreError, Result};
pub use retry::RetryPolicy;
pub use serialization::{deserialize_value, hash_bytes, hash_value, serialize_value, Codec};
pub use value::{BoxError, Value};
