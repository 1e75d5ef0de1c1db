//! Error types for flagwise

/// Result type alias using flagwise's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for classification operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Provider not usable (missing credential, bad settings)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Rate-limit, timeout or 5xx-class signal from a provider
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Response received but not parseable into a classification
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Any other provider failure
    #[error("provider error: {0}")]
    Permanent(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new transient provider error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new permanent provider error
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short, stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Transient(_) => "transient",
            Self::Protocol(_) => "protocol",
            Self::Permanent(_) => "permanent",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Timeout => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("gemini API key not configured");
        assert_eq!(
            err.to_string(),
            "configuration error: gemini API key not configured"
        );
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_serde_error_converts_to_serialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "serialization");
    }
}
