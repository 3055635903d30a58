//! Error types for the console client.

use tunedeck_core::ApiError;

use crate::config::ConfigError;
use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}
