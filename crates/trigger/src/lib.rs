//! Search triggers for Coalesce
//!
//! This crate provides:
//! - A transport-agnostic `Lookup` trait and its error type
//! - A debounced search trigger tracking loading/result/error state
//! - A lookup that shells out to an external program

pub mod command;
pub mod lookup;
pub mod searcher;

// Re-exports
pub use command::CommandLookup;
pub use lookup::{Lookup, LookupConfig, LookupError};
pub use searcher::{SearchTrigger, TriggerState};
