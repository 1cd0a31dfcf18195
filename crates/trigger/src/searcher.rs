//! Debounced search trigger
//!
//! Tracks the view-facing state of a search box: whether a lookup is in
//! flight, the last result and the last error. Every change goes through a
//! [`Debouncer`] so that typing bursts issue one lookup.

use crate::lookup::{Lookup, LookupConfig, LookupError};
use coalesce_core::{DebounceConfig, DebounceStats, Debouncer, Edge, ResultChannel};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Snapshot of the trigger's state
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerState<T> {
    /// A lookup is pending or running
    pub is_loading: bool,
    /// Term of the last completed lookup
    pub last_term: Option<String>,
    /// Payload of the last successful lookup
    pub last_result: Option<T>,
    /// Error of the last lookup, cleared on every change
    pub last_error: Option<LookupError>,
}

impl<T> Default for TriggerState<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            last_term: None,
            last_result: None,
            last_error: None,
        }
    }
}

/// Arguments carried through the debouncer
#[derive(Debug, Clone)]
struct Query {
    term: String,
    /// Change sequence number at the time of the call
    seq: u64,
}

struct Inner<T> {
    state: TriggerState<T>,
    /// Sequence number handed to the next query
    next_seq: u64,
    /// Sequence number of the latest query whose lookup will actually run
    dispatched: u64,
    /// Window of the latest query
    window: u64,
}

/// Search box handler backed by a debounced lookup
pub struct SearchTrigger<L: Lookup> {
    debouncer: Debouncer<Query, L::Output, LookupError>,
    inner: Arc<Mutex<Inner<L::Output>>>,
}

impl<L: Lookup> SearchTrigger<L> {
    /// Create a trigger around `lookup`
    pub fn new(lookup: L, debounce: DebounceConfig, config: LookupConfig) -> Self {
        let lookup = Arc::new(lookup);
        let inner = Arc::new(Mutex::new(Inner {
            state: TriggerState::default(),
            next_seq: 1,
            dispatched: 0,
            window: 0,
        }));
        let timeout = config.timeout();

        let recorder = Arc::clone(&inner);
        let debouncer = Debouncer::new(
            move |query: Query| {
                let lookup = Arc::clone(&lookup);
                let recorder = Arc::clone(&recorder);
                async move {
                    debug!(term = %query.term, "dispatching lookup");
                    let outcome = run_lookup(lookup.as_ref(), &query.term, timeout).await;
                    record(&recorder, &query, &outcome);
                    outcome
                }
            },
            debounce,
        );

        Self { debouncer, inner }
    }

    /// Handle a change of the search term
    ///
    /// Returns `None` for blank terms, which never reach the lookup and leave
    /// any outstanding lookup untouched.
    pub fn on_change(&self, term: &str) -> Option<ResultChannel<L::Output, LookupError>> {
        let term = term.trim();

        // Held across `call` so a finishing lookup cannot record in between
        let mut inner = self.inner.lock();
        inner.state.last_error = None;

        if term.is_empty() {
            debug!("ignoring blank search term");
            return None;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let channel = self.debouncer.call(Query {
            term: term.to_string(),
            seq,
        });

        // A leading window ignores calls after its first; they carry nothing new
        let absorbed = self.debouncer.edge() == Edge::Leading && channel.window_id() == inner.window;
        if !absorbed {
            inner.window = channel.window_id();
            inner.dispatched = seq;
            inner.state.is_loading = true;
        }

        Some(channel)
    }

    /// Channel of the window still waiting to fire, if any
    pub fn pending(&self) -> Option<ResultChannel<L::Output, LookupError>> {
        self.debouncer.pending_channel()
    }

    /// Drop any pending lookup
    pub fn cancel(&self) -> bool {
        let cancelled = self.debouncer.cancel();
        if cancelled {
            self.inner.lock().state.is_loading = false;
        }
        cancelled
    }

    pub fn state(&self) -> TriggerState<L::Output> {
        self.inner.lock().state.clone()
    }

    pub fn stats(&self) -> DebounceStats {
        self.debouncer.stats()
    }
}

async fn run_lookup<L: Lookup>(
    lookup: &L,
    term: &str,
    timeout: Duration,
) -> Result<L::Output, LookupError> {
    match tokio::time::timeout(timeout, lookup.lookup(term)).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout(timeout)),
    }
}

fn record<T: Clone>(inner: &Mutex<Inner<T>>, query: &Query, outcome: &Result<T, LookupError>) {
    let mut inner = inner.lock();

    match outcome {
        Ok(value) => {
            info!(term = %query.term, "lookup succeeded");
            inner.state.last_result = Some(value.clone());
            inner.state.last_error = None;
        }
        Err(e) => {
            info!(term = %query.term, "lookup failed: {}", e);
            inner.state.last_error = Some(e.clone());
        }
    }
    inner.state.last_term = Some(query.term.clone());

    // A newer dispatched query keeps the trigger loading
    if inner.dispatched == query.seq {
        inner.state.is_loading = false;
    }
}
