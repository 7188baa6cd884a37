//! Application-wide error types using thiserror
//!
//! Signal-level rejections live next to the signal and store types
//! (`ValidationError`, `AdmissionError`); everything that can stop the
//! bridge itself is wrapped in `AppError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bind or socket failure. Fatal to the bridge instance that hit it.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
