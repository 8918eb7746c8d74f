use thiserror::Error;

/// Errors raised while encoding or decoding step values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    #[error("JSON serialization failed")]
    Json(#[source] serde_json::Error),

    #[error("binary encoding failed")]
    Encode(#[source] bincode::error::EncodeError),

    #[error("binary decoding failed")]
    Decode(#[source] bincode::error::DecodeError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
