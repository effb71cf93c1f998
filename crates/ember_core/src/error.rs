//! Error type for the fallible, non-hot-path operations of the renderer.
//!
//! Per-pixel code never produces these; it falls back silently.

use thiserror::Error;

/// Errors that can occur while loading resources or validating configuration.
#[derive(Error, Debug)]
pub enum EmberError {
    #[error("Failed to load texture: {0}")]
    TextureLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid render settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("AOV '{name}' is invalid: {reason}")]
    InvalidAov { name: String, reason: String },
}

pub type EmberResult<T> = Result<T, EmberError>;

impl EmberError {
    /// Convenience constructor for AOV binding diagnostics.
    pub fn invalid_aov(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EmberError::InvalidAov {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
