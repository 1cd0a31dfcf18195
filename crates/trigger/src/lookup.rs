//! Lookup transport seam
//!
//! A lookup turns a search term into a payload. The trigger does not care how:
//! HTTP, a subprocess, an in-memory table. It only needs success or a
//! status-style failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default time allowed for a single lookup
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Asynchronous lookup transport
#[async_trait]
pub trait Lookup: Send + Sync + 'static {
    /// Payload produced for a term
    type Output: Clone + Send + Sync + 'static;

    async fn lookup(&self, term: &str) -> Result<Self::Output, LookupError>;
}

/// Lookup failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Nothing matches the term
    #[error("not found")]
    NotFound,

    /// Transport answered with a non-success status
    #[error("could not complete request (status {0})")]
    Status(u16),

    /// Transport could not be reached at all
    #[error("transport error: {0}")]
    Transport(String),

    /// Lookup exceeded its time budget
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl LookupError {
    /// Map an HTTP-style status code
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => LookupError::NotFound,
            other => LookupError::Status(other),
        }
    }

    /// Map a process exit code; exit 1 means "no match", like grep
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            1 => LookupError::NotFound,
            other => LookupError::Status(other.clamp(0, u16::MAX as i32) as u16),
        }
    }
}

/// Lookup configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Per-lookup timeout in milliseconds (default: 10000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
