//! Error types for the Veeam client.

use thiserror::Error;

/// Errors surfaced by the client. All of them are fatal to the call that
/// produced them; nothing in the library retries on its own.
#[derive(Debug, Error)]
pub enum Error {
    /// The login endpoint answered with something other than 201 Created.
    #[error("Authentication failed (status {status})")]
    Authentication { status: u16 },

    /// Login returned 201 but without the session id header.
    #[error("Login succeeded but the response carried no X-RestSvcSessionId header")]
    SessionKeyMissing,

    /// A response body did not have the expected envelope.
    #[error("Unexpected response shape from {path}: missing `{key}`")]
    ResponseShape { path: String, key: String },

    /// A caller-supplied argument was rejected before any request was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backend answered an authenticated request with a non-2xx status.
    #[error("Request to {path} failed with status {status}: {message}")]
    Remote {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Request to {path} timed out")]
    Timeout { path: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// True for transport-level failures that may succeed when repeated.
    /// Domain errors (authentication, shape, validation, remote) are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Transport(_))
    }

    pub(crate) fn shape(path: &str, key: &str) -> Self {
        Error::ResponseShape {
            path: path.to_string(),
            key: key.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
