//! Error types for the Graph client.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias using `GraphError`.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur when calling Microsoft Graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// `OAuth2` authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The caller supplied input that cannot be turned into a request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The API answered with a status outside the operation's valid set.
    #[error("Graph API error ({status}): {code} - {message}")]
    GraphApi {
        status: StatusCode,
        code: String,
        message: String,
        inner_error: Option<String>,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response with a valid status whose body could not be decoded.
    #[error("Failed to decode response ({status}): {source}")]
    Decode {
        status: StatusCode,
        source: serde_json::Error,
    },

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl GraphError {
    /// Returns the HTTP status associated with this error, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::GraphApi { status, .. } | Self::Decode { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Returns true if the API reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
