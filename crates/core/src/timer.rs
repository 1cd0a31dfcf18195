//! Timer source used by the coalescer
//!
//! The coalescer never touches a global clock. It asks its [`Timer`] for the
//! current time, for cooldown sleeps, and for somewhere to run scheduled fires.
//! [`TokioTimer`] honours tokio's paused clock, so tests can drive windows
//! with `tokio::time::advance` instead of waiting on the wall clock.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clock plus task spawner
pub trait Timer: Send + Sync + 'static {
    /// Current instant according to this timer
    fn now(&self) -> Instant;

    /// Future that completes after `duration`
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Run `task` to completion in the background
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Timer backed by the ambient tokio runtime
///
/// `spawn` must be called from within a runtime context.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}

/// Shared timer handle
#[derive(Clone)]
pub struct SharedTimer(Arc<dyn Timer>);

impl SharedTimer {
    pub fn new<T: Timer>(timer: T) -> Self {
        Self(Arc::new(timer))
    }
}

impl Default for SharedTimer {
    fn default() -> Self {
        Self::new(TokioTimer)
    }
}

impl std::ops::Deref for SharedTimer {
    type Target = dyn Timer;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for SharedTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedTimer")
    }
}
