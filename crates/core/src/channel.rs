//! Single-resolution result channel shared by coalesced callers
//!
//! Every caller that lands in the same debounce window receives a clone of
//! the same channel. The channel settles exactly once and then never changes.
//! It is a plain `Future` built on `futures` primitives, so it can be awaited
//! from any executor.

use crate::error::CoalesceError;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

/// Outcome delivered to every caller in a window
pub type Outcome<T, E> = Result<T, CoalesceError<E>>;

/// Awaitable handle on one window's eventual outcome
pub struct ResultChannel<T, E> {
    /// Window this channel belongs to
    window: u64,
    /// Shared receiver; settles once for every clone
    inner: Shared<BoxFuture<'static, Outcome<T, E>>>,
}

/// Write half of a [`ResultChannel`]
///
/// Dropping it unsent settles the channel with [`CoalesceError::Abandoned`].
pub(crate) struct Settle<T, E> {
    window: u64,
    tx: oneshot::Sender<Outcome<T, E>>,
}

impl<T, E> ResultChannel<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create an unsettled channel for `window`
    pub(crate) fn pending(window: u64) -> (Settle<T, E>, Self) {
        let (tx, rx) = oneshot::channel();
        let inner = rx
            .map(|received| received.unwrap_or(Err(CoalesceError::Abandoned)))
            .boxed()
            .shared();

        (Settle { window, tx }, Self { window, inner })
    }

    /// Identifier of the window that produced this channel
    pub fn window_id(&self) -> u64 {
        self.window
    }

    /// Whether both handles observe the same window
    pub fn same_window(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Settled outcome, without waiting
    pub fn peek(&self) -> Option<Outcome<T, E>> {
        self.inner.clone().now_or_never()
    }

    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }
}

impl<T, E> Settle<T, E> {
    pub(crate) fn window_id(&self) -> u64 {
        self.window
    }

    /// Settle the channel; later settles are impossible since this consumes `self`
    pub(crate) fn resolve(self, outcome: Outcome<T, E>) {
        if self.tx.send(outcome).is_err() {
            trace!(window = self.window, "no caller left to observe outcome");
        }
    }
}

impl<T, E> Clone for ResultChannel<T, E> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Future for ResultChannel<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T, E> fmt::Debug for ResultChannel<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultChannel")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
