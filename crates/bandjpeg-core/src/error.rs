//! Error types shared by every codec stage.

use thiserror::Error;

/// Errors that can occur while compressing or decompressing bands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StripeError {
    /// A pixel format or subsampling value outside the supported table.
    #[error("Invalid pixel format: {0}")]
    InvalidFormat(String),

    /// The underlying JPEG primitive reported a failure.
    #[error("JPEG codec failed: {0}")]
    Codec(String),

    /// A configuration the striped path does not implement.
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Measured dimensions or byte counts disagree with the declared ones.
    #[error("Size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StripeError>;

impl StripeError {
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        StripeError::UnsupportedConfiguration(msg.into())
    }

    pub(crate) fn codec(msg: impl std::fmt::Display) -> Self {
        StripeError::Codec(msg.to_string())
    }
}
