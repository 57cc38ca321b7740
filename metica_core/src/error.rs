use std::sync::Arc;

/// Represents a result type for operations in the Metica SDK.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// Metica-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the Metica SDK.
///
/// Errors surface to application code as values; the `Display` implementation provides the
/// human-readable message handed to callers.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The request was unauthorized. The API key is missing or likely invalid.
    #[error("unauthorized, api_key is missing or likely invalid")]
    Unauthorized,

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// No network connection could be established.
    #[error("no network connection")]
    NoConnection,

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled before completion.
    #[error("request was cancelled")]
    Cancelled,

    /// The server responded with a non-success HTTP status.
    #[error("server responded with status {status}")]
    HttpStatus {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// Indicates that a background task thread panicked. This should normally never happen.
    #[error("background task panicked")]
    BackgroundTaskPanicked,

    /// Failure serializing or deserializing a payload.
    #[error(transparent)]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    Serialization(Arc<serde_json::Error>),

    /// A storage I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Network error that does not fit a more specific classification.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Error::Timeout
        } else if value.is_connect() {
            Error::NoConnection
        } else if let Some(status) = value.status() {
            Error::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            Error::Network(Arc::new(value.without_url()))
        }
    }
}
