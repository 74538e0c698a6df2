//! Error taxonomy for the folder pipeline (spec.md §7).

use thiserror::Error;

/// Result type used by every fallible core operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds a storage backend or pipeline step can raise.
#[derive(Error, Debug)]
pub enum Error {
    /// Object does not exist (from `get`, `stat`).
    #[error("not found: {0}")]
    NotFound(String),

    /// Upload name missing extension, zero-byte body, declared size <= 0, ...
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Image bytes not a valid JPEG (or watermark not a valid PNG).
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Backend reports a retryable failure (network, 5xx).
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Backend reports a non-retryable failure (auth, 4xx != 404).
    #[error("permanent storage error: {0}")]
    Permanent(String),

    /// Invariant F1 violated, an automation has zero steps, an unknown
    /// namer/step kind was requested, or a child automation cycle was
    /// detected.
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether this error is expected to resolve itself if retried
    /// (used by the synchronizer/backup loop to decide on a warn vs error log).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}
