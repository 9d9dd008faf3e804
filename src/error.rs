//! # Error Types
//!
//! Custom error types for Router Signal using `thiserror`.
//!
//! Field-level absence is never an error (see [`FieldValue::Absent`]). The
//! variants below are step-level failures: the monitor logs them and retries
//! the whole cycle. Only configuration errors are fatal, and only at startup.
//!
//! [`FieldValue::Absent`]: crate::telemetry::types::FieldValue::Absent

use thiserror::Error;

use crate::session::SessionState;

/// Main error type for Router Signal
#[derive(Debug, Error)]
pub enum RouterSignalError {
    /// Expected UI element absent
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Bounded wait exceeded
    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    /// Primary login and every alternate candidate failed
    #[error("All login candidates exhausted: {0}")]
    AllCandidatesExhausted(String),

    /// Telemetry page did not come back after a refresh
    #[error("Telemetry page unavailable: {0}")]
    ParseFailure(String),

    /// Automation transport or protocol error
    #[error("Driver fault: {0}")]
    DriverFault(String),

    /// Router bounced us back to its login page
    #[error("Session expired: redirected to {0}")]
    SessionExpired(String),

    /// Operation called from the wrong session state
    #[error("Invalid session state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: SessionState,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors talking to the WebDriver server
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RouterSignalError {
    /// Whether the polling loop should treat this as a transient failure.
    ///
    /// Everything except configuration problems is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RouterSignalError::Config(_))
    }
}

/// Result type alias for Router Signal
pub type Result<T> = std::result::Result<T, RouterSignalError>;
