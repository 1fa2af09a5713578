//! Error handling for the speedwatch crate.

/// A specialized `Result` type for speedwatch operations.
pub type Result<T> = std::result::Result<T, SpeedwatchError>;

/// The main error type for speedwatch operations.
#[derive(Debug, thiserror::Error)]
pub enum SpeedwatchError {
    /// The host has no usable internet connection right now.
    ///
    /// This is an expected, frequent condition rather than a fault: the
    /// polling loop swallows it silently and retries on the short delay.
    #[error("offline")]
    Offline,

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Downloaded archive was unusable
    #[error("Archive error: {0}")]
    Archive(String),

    /// The measurement tool could not be spawned or exited non-zero
    #[error("Measurement tool error: {0}")]
    Subprocess(String),

    /// The measurement tool produced malformed output
    #[error("Failed to parse measurement output: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SpeedwatchError {
    /// Create a new archive error
    pub fn archive_error(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a new subprocess error
    pub fn subprocess_error(msg: impl Into<String>) -> Self {
        Self::Subprocess(msg.into())
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this is the expected offline sentinel rather than a fault.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }
}
