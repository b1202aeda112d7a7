/// Result alias that carries the custom [`ScopeError`] type.
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// Free-form error for conditions that do not deserve their own variant.
    #[error("{0}")]
    Message(String),
    /// A configuration value was rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A colour string could not be parsed.
    #[error("invalid colour `{0}`, expected #rgb, #rrggbb or #rrggbbaa")]
    InvalidColor(String),
    /// A shared audio node was poisoned by a panicking writer.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    /// Wrapper around FFT failures from the analyser.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// Wrapper around configuration (de)serialisation failures.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl ScopeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
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
