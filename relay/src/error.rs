//! Error types for the scene relay pipeline

use thiserror::Error;

/// Result type alias for the relay crate
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur in the relay pipeline
///
/// Only `Config` is ever fatal, and only at startup. `Transport`
/// covers socket setup; mid-run source and send failures never
/// surface here, the tick loop logs and absorbs them.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl RelayError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
