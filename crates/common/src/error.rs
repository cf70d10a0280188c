//! Error types shared across pidrec crates.

/// Top-level error type for pidrec operations.
#[derive(Debug, thiserror::Error)]
pub enum PidrecError {
    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Discovery error: {message}")]
    Discovery { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PidrecError.
pub type PidrecResult<T> = Result<T, PidrecError>;

impl PidrecError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_constructors_format_their_category() {
        assert_eq!(
            PidrecError::encoder("mux refused").to_string(),
            "Encoder error: mux refused"
        );
        assert_eq!(
            PidrecError::invalid_state("stop before start").to_string(),
            "Invalid state: stop before start"
        );
    }

    #[test]
    fn io_errors_convert_transparently() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: PidrecError = io.into();
        assert!(matches!(err, PidrecError::Io(_)));
        assert_eq!(err.to_string(), "nope");
    }
}
