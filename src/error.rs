//! Error handling for the Sentinel Console sync engine

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure (request failed, connection dropped)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed payload
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Backend responded with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Write rejected or overlapping mutation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl Error {
    /// True when the failure came from the wire rather than the backend
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
