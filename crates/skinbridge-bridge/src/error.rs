//! Bridge error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    #[error("bridge task is no longer running")]
    Closed,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
