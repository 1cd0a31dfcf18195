//! Debounce coalescer
//!
//! Wraps an operation so that bursts of calls collapse into a single
//! execution. Every call returns a [`ResultChannel`] straight away; all calls
//! that land in the same window share one channel and observe one outcome.
//!
//! Two firing policies are supported:
//! - **Trailing** (default): each call re-arms the cooldown. When the window
//!   finally goes quiet the operation runs once, with the last call's
//!   arguments.
//! - **Leading**: the first call in a closed window runs the operation
//!   immediately. Calls made before the cooldown elapses get the same
//!   channel and never run the operation.

use crate::channel::{Outcome, ResultChannel, Settle};
use crate::config::{DebounceConfig, Edge};
use crate::error::{panic_message, CoalesceError};
use crate::timer::{SharedTimer, Timer};
use futures::future::{self, AbortHandle, BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

type Operation<A, T, E> = dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync;

/// Debounced wrapper around an operation
///
/// Cloning yields another handle onto the same windows.
pub struct Debouncer<A, T, E> {
    shared: Arc<Shared<A, T, E>>,
}

struct Shared<A, T, E> {
    operation: Box<Operation<A, T, E>>,
    cooldown: Duration,
    edge: Edge,
    timer: SharedTimer,
    state: Mutex<State<A, T, E>>,
    counters: Counters,
}

struct State<A, T, E> {
    /// Id handed to the next window
    next_window: u64,
    /// Generation handed to the next armed fire
    next_arm: u64,
    /// The open window, if any (at most one)
    pending: Option<Window<A, T, E>>,
}

struct Window<A, T, E> {
    id: u64,
    opened_at: Instant,
    last_call_at: Instant,
    /// Generation of the fire currently armed for this window
    armed: u64,
    fire: AbortHandle,
    kind: WindowKind<A, T, E>,
    channel: ResultChannel<T, E>,
}

enum WindowKind<A, T, E> {
    /// Waiting to run with the latest arguments
    Trailing { args: A, settle: Settle<T, E> },
    /// Already running or finished; the fire only closes the window
    Leading,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    invocations: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

/// Counter snapshot for one coalescer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebounceStats {
    /// Calls received
    pub calls: u64,
    /// Times the operation actually ran
    pub invocations: u64,
    /// Calls absorbed into an already open window
    pub coalesced: u64,
    /// Invocations that ended in an error or panic
    pub failures: u64,
}

impl<A, T, E> Debouncer<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Wrap an async operation using the tokio timer
    pub fn new<F, Fut>(operation: F, config: DebounceConfig) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::with_timer(operation, config, SharedTimer::default())
    }

    /// Wrap a synchronous operation
    pub fn from_fn<F>(operation: F, config: DebounceConfig) -> Self
    where
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::new(move |args| future::ready(operation(args)), config)
    }

    /// Wrap an async operation with an explicit timer source
    pub fn with_timer<F, Fut>(operation: F, config: DebounceConfig, timer: SharedTimer) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let operation: Box<Operation<A, T, E>> = Box::new(move |args| operation(args).boxed());

        Self {
            shared: Arc::new(Shared {
                operation,
                cooldown: config.cooldown(),
                edge: config.edge,
                timer,
                state: Mutex::new(State {
                    next_window: 1,
                    next_arm: 1,
                    pending: None,
                }),
                counters: Counters::default(),
            }),
        }
    }

    /// Trigger the operation; returns the current window's channel
    pub fn call(&self, args: A) -> ResultChannel<T, E> {
        self.shared.counters.calls.fetch_add(1, Ordering::Relaxed);

        match self.shared.edge {
            Edge::Trailing => self.call_trailing(args),
            Edge::Leading => self.call_leading(args),
        }
    }

    fn call_trailing(&self, args: A) -> ResultChannel<T, E> {
        let now = self.shared.timer.now();

        let (channel, fire) = {
            let mut state = self.shared.state.lock();
            let armed = state.next_arm;
            state.next_arm += 1;
            let (fire, handle) = self.shared.schedule(armed);

            if let Some(window) = state.pending.as_mut() {
                // Supersede the previous fire; its generation no longer matches
                window.fire.abort();
                window.fire = handle;
                window.armed = armed;
                window.last_call_at = now;
                if let WindowKind::Trailing { args: latest, .. } = &mut window.kind {
                    *latest = args;
                }
                self.shared.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                trace!(window = window.id, armed, "re-armed trailing window");
                (window.channel.clone(), fire)
            } else {
                let id = state.next_window;
                state.next_window += 1;
                let (settle, channel) = ResultChannel::pending(id);

                state.pending = Some(Window {
                    id,
                    opened_at: now,
                    last_call_at: now,
                    armed,
                    fire: handle,
                    kind: WindowKind::Trailing { args, settle },
                    channel: channel.clone(),
                });
                debug!(window = id, cooldown = ?self.shared.cooldown, "opened trailing window");
                (channel, fire)
            }
        };

        self.shared.timer.spawn(fire);
        channel
    }

    fn call_leading(&self, args: A) -> ResultChannel<T, E> {
        let now = self.shared.timer.now();

        let (settle, channel, fire) = {
            let mut state = self.shared.state.lock();

            if let Some(window) = state.pending.as_mut() {
                window.last_call_at = now;
                self.shared.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                trace!(window = window.id, "call absorbed by open leading window");
                return window.channel.clone();
            }

            let id = state.next_window;
            state.next_window += 1;
            let armed = state.next_arm;
            state.next_arm += 1;
            let (settle, channel) = ResultChannel::pending(id);
            let (fire, handle) = self.shared.schedule(armed);

            state.pending = Some(Window {
                id,
                opened_at: now,
                last_call_at: now,
                armed,
                fire: handle,
                kind: WindowKind::Leading,
                channel: channel.clone(),
            });
            debug!(window = id, cooldown = ?self.shared.cooldown, "opened leading window");
            (settle, channel, fire)
        };

        self.shared.timer.spawn(fire);
        // The operation is invoked here, before `call` returns
        let run = self.shared.run(args, settle);
        self.shared.timer.spawn(run);
        channel
    }

    /// Drop the open window without running it
    ///
    /// A trailing window's channel settles with [`CoalesceError::Abandoned`].
    /// A leading window's operation has already started and still settles its
    /// channel; only the window closes early. Returns whether a window was open.
    pub fn cancel(&self) -> bool {
        let window = self.shared.state.lock().pending.take();

        match window {
            Some(window) => {
                window.fire.abort();
                debug!(window = window.id, "cancelled window");
                true
            }
            None => false,
        }
    }

    /// Whether a window is currently open
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// Channel of the open window, if any
    pub fn pending_channel(&self) -> Option<ResultChannel<T, E>> {
        self.shared
            .state
            .lock()
            .pending
            .as_ref()
            .map(|window| window.channel.clone())
    }

    pub fn cooldown(&self) -> Duration {
        self.shared.cooldown
    }

    pub fn edge(&self) -> Edge {
        self.shared.edge
    }

    pub fn stats(&self) -> DebounceStats {
        let counters = &self.shared.counters;
        DebounceStats {
            calls: counters.calls.load(Ordering::Relaxed),
            invocations: counters.invocations.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
        }
    }
}

impl<A, T, E> Shared<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Build the abortable fire task for generation `armed`
    ///
    /// The cooldown starts now, not when the task is first polled.
    fn schedule(self: &Arc<Self>, armed: u64) -> (BoxFuture<'static, ()>, AbortHandle) {
        let shared = Arc::clone(self);
        let sleep = self.timer.sleep(self.cooldown);

        let (task, handle) = future::abortable(async move {
            sleep.await;
            shared.fire(armed).await;
        });

        (task.map(|_| ()).boxed(), handle)
    }

    async fn fire(self: Arc<Self>, armed: u64) {
        let window = {
            let mut state = self.state.lock();
            match state.pending.as_ref() {
                Some(window) if window.armed == armed => state.pending.take(),
                _ => None,
            }
        };

        let Some(window) = window else {
            trace!(armed, "discarding superseded fire");
            return;
        };

        let now = self.timer.now();
        match window.kind {
            WindowKind::Trailing { args, settle } => {
                debug!(
                    window = window.id,
                    open_for = ?now.saturating_duration_since(window.opened_at),
                    quiet_for = ?now.saturating_duration_since(window.last_call_at),
                    "firing trailing window"
                );
                self.run(args, settle).await;
            }
            WindowKind::Leading => {
                debug!(
                    window = window.id,
                    open_for = ?now.saturating_duration_since(window.opened_at),
                    "closed leading window"
                );
            }
        }
    }

    /// Invoke the operation now and return the future that settles `settle`
    fn run(self: &Arc<Self>, args: A, settle: Settle<T, E>) -> BoxFuture<'static, ()> {
        self.counters.invocations.fetch_add(1, Ordering::Relaxed);
        let window = settle.window_id();

        let started = std::panic::catch_unwind(AssertUnwindSafe(|| (self.operation)(args)));
        let shared = Arc::clone(self);

        async move {
            let outcome: Outcome<T, E> = match started {
                Ok(pending) => match AssertUnwindSafe(pending).catch_unwind().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(CoalesceError::Operation(e)),
                    Err(payload) => Err(CoalesceError::Panicked(panic_message(payload))),
                },
                Err(payload) => Err(CoalesceError::Panicked(panic_message(payload))),
            };

            match &outcome {
                Ok(_) => trace!(window, "operation succeeded"),
                Err(CoalesceError::Panicked(msg)) => {
                    shared.counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(window, "operation panicked: {}", msg);
                }
                Err(_) => {
                    shared.counters.failures.fetch_add(1, Ordering::Relaxed);
                    debug!(window, "operation failed");
                }
            }

            settle.resolve(outcome);
        }
        .boxed()
    }
}

impl<A, T, E> Clone for Debouncer<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, T, E> std::fmt::Debug for Debouncer<A, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("cooldown", &self.shared.cooldown)
            .field("edge", &self.shared.edge)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use tokio::time::{advance, Instant as TokioInstant};

    type Calls = Arc<Mutex<Vec<(u32, Duration)>>>;

    /// Operation that records its argument and the virtual time it ran at
    fn recording(start: TokioInstant) -> (Calls, impl Fn(u32) -> future::Ready<Result<u32, String>>) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&calls);
        let op = move |n: u32| {
            log.lock().push((n, start.elapsed()));
            future::ready(Ok(n * 10))
        };
        (calls, op)
    }

    async fn let_tasks_run() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Timer whose clock only moves when the test advances it
    #[derive(Clone)]
    struct ManualTimer {
        base: Instant,
        clock: Arc<Mutex<ManualClock>>,
    }

    #[derive(Default)]
    struct ManualClock {
        elapsed: Duration,
        sleepers: Vec<(Duration, oneshot::Sender<()>)>,
    }

    impl ManualTimer {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                clock: Arc::default(),
            }
        }

        /// Move the clock forward and wake every sleeper that is now due
        fn advance(&self, by: Duration) {
            let due = {
                let mut clock = self.clock.lock();
                clock.elapsed += by;
                let now = clock.elapsed;
                let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut clock.sleepers)
                    .into_iter()
                    .partition(|(deadline, _)| *deadline <= now);
                clock.sleepers = waiting;
                due
            };
            for (_, tx) in due {
                // Receiver is gone when the fire was superseded
                let _ = tx.send(());
            }
        }
    }

    impl Timer for ManualTimer {
        fn now(&self) -> Instant {
            self.base + self.clock.lock().elapsed
        }

        fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
            if duration.is_zero() {
                return future::ready(()).boxed();
            }
            let (tx, rx) = oneshot::channel();
            let mut clock = self.clock.lock();
            let deadline = clock.elapsed + duration;
            clock.sleepers.push((deadline, tx));
            rx.map(|_| ()).boxed()
        }

        fn spawn(&self, task: BoxFuture<'static, ()>) {
            tokio::spawn(task);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_burst_runs_once_with_last_args() {
        let start = TokioInstant::now();
        let (calls, op) = recording(start);
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::from_millis(100)));

        let first = debouncer.call(1);
        advance(Duration::from_millis(30)).await;
        let second = debouncer.call(2);
        advance(Duration::from_millis(30)).await;
        let third = debouncer.call(3);

        // Nothing fires before last call + cooldown
        advance(Duration::from_millis(99)).await;
        let_tasks_run().await;
        assert!(calls.lock().is_empty());

        assert_eq!(first.clone().await, Ok(30));
        assert_eq!(second.await, Ok(30));
        assert_eq!(third.await, Ok(30));

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 3);
        assert!(calls[0].1 >= Duration::from_millis(160));
        assert!(calls[0].1 < Duration::from_millis(170));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_channels_are_identical() {
        let (_calls, op) = recording(TokioInstant::now());
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::from_millis(100)));

        let channels: Vec<_> = (0..5).map(|n| debouncer.call(n)).collect();
        for channel in &channels[1..] {
            assert!(channel.same_window(&channels[0]));
        }
        assert!(debouncer.is_pending());

        for channel in channels {
            assert_eq!(channel.await, Ok(40));
        }
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_runs_immediately_and_absorbs_window() {
        let start = TokioInstant::now();
        let (calls, op) = recording(start);
        let debouncer = Debouncer::new(op, DebounceConfig::leading(Duration::from_millis(100)));

        let first = debouncer.call(1);
        assert_eq!(calls.lock().len(), 1);

        advance(Duration::from_millis(30)).await;
        let second = debouncer.call(2);
        advance(Duration::from_millis(30)).await;
        let third = debouncer.call(3);

        assert!(second.same_window(&first));
        assert!(third.same_window(&first));
        assert_eq!(third.await, Ok(10));
        assert_eq!(calls.lock().as_slice(), &[(1, Duration::ZERO)]);

        // Window closes one cooldown after the leading call
        advance(Duration::from_millis(41)).await;
        let_tasks_run().await;
        assert!(!debouncer.is_pending());

        let reopened = debouncer.call(4);
        assert!(!reopened.same_window(&first));
        assert_eq!(reopened.await, Ok(40));
        assert_eq!(calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_caller() {
        let debouncer: Debouncer<u32, u32, String> = Debouncer::from_fn(
            |n| Err(format!("lookup {} failed", n)),
            DebounceConfig::trailing(Duration::from_millis(50)),
        );

        let a = debouncer.call(1);
        let b = debouncer.call(2);
        let c = debouncer.call(3);

        let expected = Err(CoalesceError::Operation("lookup 3 failed".to_string()));
        assert_eq!(a.await, expected);
        assert_eq!(b.await, expected);
        assert_eq!(c.await, expected);
        assert_eq!(debouncer.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_failure_is_shared() {
        let debouncer: Debouncer<u32, u32, String> = Debouncer::from_fn(
            |_| Err("unavailable".to_string()),
            DebounceConfig::leading(Duration::from_millis(50)),
        );

        let a = debouncer.call(1);
        let b = debouncer.call(2);

        assert!(a.same_window(&b));
        assert_eq!(a.await, Err(CoalesceError::Operation("unavailable".to_string())));
        assert_eq!(b.await, Err(CoalesceError::Operation("unavailable".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panics_become_rejections() {
        let sync_panic: Debouncer<u32, u32, String> = Debouncer::from_fn(
            |_| panic!("sync boom"),
            DebounceConfig::trailing(Duration::from_millis(10)),
        );
        assert_eq!(
            sync_panic.call(1).await,
            Err(CoalesceError::Panicked("sync boom".to_string()))
        );

        let async_panic: Debouncer<u32, u32, String> = Debouncer::new(
            |n| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                if n < 100 {
                    panic!("async boom");
                }
                Ok(n)
            },
            DebounceConfig::trailing(Duration::from_millis(10)),
        );
        assert_eq!(
            async_panic.call(1).await,
            Err(CoalesceError::Panicked("async boom".to_string()))
        );

        // The instance stays usable after a failure
        assert!(matches!(sync_panic.call(2).await, Err(CoalesceError::Panicked(_))));
        assert_eq!(sync_panic.stats().invocations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_window_is_replaced_by_fresh_channel() {
        let (calls, op) = recording(TokioInstant::now());
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::from_millis(100)));

        let first = debouncer.call(1);
        assert_eq!(first.clone().await, Ok(10));

        let second = debouncer.call(2);
        assert!(!second.same_window(&first));
        assert!(second.window_id() > first.window_id());
        assert_eq!(second.await, Ok(20));

        // The old channel never changes
        assert_eq!(first.peek(), Some(Ok(10)));
        assert_eq!(calls.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_during_slow_operation_opens_new_window() {
        let debouncer: Debouncer<u32, u32, String> = Debouncer::new(
            |n| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(n)
            },
            DebounceConfig::trailing(Duration::from_millis(100)),
        );

        let first = debouncer.call(1);
        advance(Duration::from_millis(120)).await;
        let_tasks_run().await;

        // First window fired at t=100 and its operation is still running
        assert!(!debouncer.is_pending());
        assert!(!first.is_settled());

        let second = debouncer.call(2);
        assert!(!second.same_window(&first));
        assert_eq!(first.await, Ok(1));
        assert_eq!(second.await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_fire_separately() {
        let (calls, op) = recording(TokioInstant::now());
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::from_millis(100)));

        let first = debouncer.call(1);
        advance(Duration::from_millis(150)).await;
        let_tasks_run().await;
        assert_eq!(first.peek(), Some(Ok(10)));

        let second = debouncer.call(2);
        assert_eq!(second.await, Ok(20));

        let calls = calls.lock();
        assert_eq!(calls.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_trailing_window() {
        let (calls, op) = recording(TokioInstant::now());
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::from_millis(100)));

        let channel = debouncer.call(1);
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        assert_eq!(channel.await, Err(CoalesceError::Abandoned));
        advance(Duration::from_millis(200)).await;
        let_tasks_run().await;
        assert!(calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_cooldown() {
        let (calls, op) = recording(TokioInstant::now());
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::ZERO));

        assert_eq!(debouncer.call(7).await, Ok(70));
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_track_coalescing() {
        let (_calls, op) = recording(TokioInstant::now());
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::from_millis(20)));

        for n in 0..4 {
            debouncer.call(n);
        }
        let channel = debouncer.pending_channel().unwrap();
        assert_eq!(channel.await, Ok(30));

        assert_eq!(
            debouncer.stats(),
            DebounceStats {
                calls: 4,
                invocations: 1,
                coalesced: 3,
                failures: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_windows() {
        let (calls, op) = recording(TokioInstant::now());
        let debouncer = Debouncer::new(op, DebounceConfig::trailing(Duration::from_millis(100)));
        let other = debouncer.clone();

        let a = debouncer.call(1);
        let b = other.call(2);

        assert!(a.same_window(&b));
        assert_eq!(a.await, Ok(20));
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_timer_drives_trailing_window() {
        let timer = ManualTimer::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&calls);
        let debouncer = Debouncer::with_timer(
            move |n: u32| {
                log.lock().push(n);
                future::ready(Ok::<_, String>(n + 1))
            },
            DebounceConfig::trailing(Duration::from_millis(100)),
            SharedTimer::new(timer.clone()),
        );

        let first = debouncer.call(1);
        timer.advance(Duration::from_millis(60));
        let second = debouncer.call(2);
        timer.advance(Duration::from_millis(60));
        let_tasks_run().await;

        // 120ms after the first call, only 60ms after the last
        assert!(calls.lock().is_empty());
        assert!(debouncer.is_pending());

        timer.advance(Duration::from_millis(40));
        assert_eq!(first.await, Ok(3));
        assert_eq!(second.await, Ok(3));
        assert_eq!(*calls.lock(), vec![2]);
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.stats().invocations, 1);
    }
}
