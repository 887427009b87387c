//! Error types for the signal bot

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the signal bot
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    /// Not enough samples in the window. Callers skip the cycle, this is not a failure.
    #[error("Insufficient data: have {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("External fetch failed: {0}")]
    ExternalFetch(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Order submission failed: {0}")]
    OrderSubmission(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Insufficient data is an expected state while the window warms up
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Error::InsufficientData { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_display() {
        let err = Error::InsufficientData { have: 3, need: 21 };
        assert_eq!(err.to_string(), "Insufficient data: have 3 samples, need 21");
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_other_errors_are_not_insufficient_data() {
        assert!(!Error::ExternalFetch("timeout".to_string()).is_insufficient_data());
        assert!(!Error::InvalidPrice(-1.0).is_insufficient_data());
    }
}
