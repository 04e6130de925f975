//! Error types for the node orchestration client.

use reqwest::StatusCode;
use serenity::model::id::GuildId;
use thiserror::Error;

/// Result type alias for manager and player operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for calls against a node's REST API.
pub type RestResult<T> = std::result::Result<T, RestError>;

/// Errors surfaced by the public manager/player surface.
#[derive(Debug, Error)]
pub enum Error {
    /// No connected node can take a new session or search
    #[error("no available nodes")]
    NoAvailableNodes,

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("node already exists: {0}")]
    NodeExists(String),

    #[error("no player for guild {0}")]
    PlayerNotFound(GuildId),

    /// The manager has no bot user id yet
    #[error("client id not set, call Manager::init first")]
    NoClientId,

    #[error("queue is full (max {0} tracks)")]
    QueueFull(usize),

    #[error("queue is empty")]
    QueueEmpty,

    #[error("node request failed: {0}")]
    Rest(#[from] RestError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Failure of a single REST call. Nothing is retried.
#[derive(Debug, Error)]
pub enum RestError {
    /// The node has not sent its `ready` handshake yet
    #[error("node session not established")]
    NoSession,

    #[error("unauthorized, check the node password")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("node returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// Maps a non-2xx status and its body into the matching variant.
    pub(crate) fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RestError::Unauthorized,
            StatusCode::NOT_FOUND => RestError::NotFound(message),
            status => RestError::Status { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            RestError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            RestError::Unauthorized
        ));
        assert!(matches!(
            RestError::from_status(StatusCode::NOT_FOUND, "Session not found".into()),
            RestError::NotFound(message) if message == "Session not found"
        ));
        assert!(matches!(
            RestError::from_status(StatusCode::BAD_REQUEST, "bad".into()),
            RestError::Status { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }
}
