/// Result alias that carries the custom [`ScopeError`] type.
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// The audio subsystem could not grant a usable capture device. Any
    /// previous session has already been stopped when this is returned.
    #[error("failed to open capture device {index}: {reason}")]
    DeviceOpen { index: usize, reason: String },
    /// The requested device index is outside the enumerated device list.
    #[error("no capture device at index {index} ({available} available)")]
    DeviceNotFound { index: usize, available: usize },
    /// Errors reported by the audio backend outside of device opening, such
    /// as enumeration failures.
    #[error("audio backend error: {0}")]
    Backend(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("spectrum transform failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// A lock shared with the capture callback was poisoned by a panic.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl ScopeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn open<T: ToString>(index: usize, reason: T) -> Self {
        Self::DeviceOpen {
            index,
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for ScopeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ScopeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
