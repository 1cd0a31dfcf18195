//! Coalesce Core - debounce primitives for bursty asynchronous triggers
//!
//! This crate provides:
//! - A debounce coalescer with trailing-edge and leading-edge policies
//! - A single-resolution result channel shared by coalesced callers
//! - An injectable timer source (tokio by default)
//! - Serializable configuration

pub mod channel;
pub mod config;
pub mod debounce;
pub mod error;
pub mod timer;

// Re-export main types for convenience
pub use channel::{Outcome, ResultChannel};
pub use config::{DebounceConfig, Edge};
pub use debounce::{DebounceStats, Debouncer};
pub use error::{CoalesceError, ConfigError};
pub use timer::{SharedTimer, Timer, TokioTimer};
