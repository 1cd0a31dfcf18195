//! Error types for the coalescer and its configuration

use thiserror::Error;

/// Failure observed by every caller coalesced into a window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoalesceError<E> {
    /// The wrapped operation returned an error
    #[error("operation failed: {0}")]
    Operation(E),

    /// The wrapped operation panicked, either when called or while running
    #[error("operation panicked: {0}")]
    Panicked(String),

    /// The window was cancelled or its coalescer shut down before firing
    #[error("window abandoned before the operation ran")]
    Abandoned,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cooldown_ms must be at most {max} (got {got})")]
    CooldownOutOfRange { got: u64, max: u64 },
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
