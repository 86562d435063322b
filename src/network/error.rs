use std::time::Duration;
use thiserror::Error;

/// Failures talking to the smart plugs or the telemetry endpoint.
///
/// None of these are fatal; callers log them and carry on.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("HTTP client error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("server answered with status {0}")]
    Http(u16),
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}
