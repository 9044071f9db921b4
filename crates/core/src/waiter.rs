//! One-shot cancellable timeout execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Callback invoked when a waiter expires naturally.
pub type TimeoutHandler = Arc<dyn Fn() + Send + Sync>;

/// Schedules a one-shot delayed callback, cancellable mid-wait.
///
/// Guarantees, independent of the scheduling strategy:
///
/// - the handler fires at most once per `run()`,
/// - cancellation preempts expiry: a handler never fires after the
///   cancellation was observed,
/// - a zero duration never self-expires; only `cancel()` stops it.
///
/// `cancel()` is a fire-and-forget signal. It does not wait for the
/// background unit to observe it, so `is_running()` reflects the flag,
/// not whether the background unit has fully exited.
pub trait Waiter: Send {
    /// Effective only before `run()`. Zero means "wait indefinitely".
    fn set_timeout(&mut self, timeout: Duration);

    /// Effective only before `run()`.
    fn set_timeout_handler(&mut self, handler: Option<TimeoutHandler>);

    /// Start the background wait. Fails if already running.
    fn run(&mut self) -> bool;

    /// Request cancellation. Safe to call when not running.
    fn cancel(&mut self) -> bool;

    fn is_running(&self) -> bool;
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// [`Waiter`] running on a dedicated thread that polls a cancellation
/// flag at a bounded granularity. Expiry can therefore land up to one
/// polling interval late; this is an approximation, not a precision
/// timer.
pub struct ThreadWaiter {
    timeout: Duration,
    handler: Option<TimeoutHandler>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl ThreadWaiter {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            timeout: Duration::ZERO,
            handler: None,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for ThreadWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter for ThreadWaiter {
    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn set_timeout_handler(&mut self, handler: Option<TimeoutHandler>) {
        self.handler = handler;
    }

    fn run(&mut self) -> bool {
        if self.is_running() {
            warn!("a waiter is already running");
            return false;
        }

        // Fresh flag per run, so a straggler thread from an earlier run
        // can never observe this run's state.
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        let timeout = self.timeout;
        let handler = self.handler.clone();
        let poll = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("wakeful-waiter".into())
            .spawn(move || {
                let deadline = if timeout.is_zero() {
                    debug!("waiting indefinitely");
                    None
                } else {
                    debug!(timeout_secs = timeout.as_secs(), "waiting");
                    Some(Instant::now() + timeout)
                };

                loop {
                    if !running.load(Ordering::Acquire) {
                        debug!("waiter cancelled");
                        return;
                    }
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            break;
                        }
                    }
                    thread::sleep(poll);
                }

                // Claim the expiry; a concurrent cancel that cleared the
                // flag first wins and the handler stays silent.
                if running.swap(false, Ordering::AcqRel) {
                    debug!("waiter expired");
                    if let Some(handler) = handler {
                        handler();
                    }
                }
            });

        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn the waiter thread");
            self.running.store(false, Ordering::Release);
            return false;
        }
        true
    }

    fn cancel(&mut self) -> bool {
        debug!("cancel waiter");
        self.running.store(false, Ordering::Release);
        true
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    const POLL: Duration = Duration::from_millis(5);

    fn counting_waiter() -> (ThreadWaiter, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut waiter = ThreadWaiter::with_poll_interval(POLL);
        let handler_count = count.clone();
        waiter.set_timeout_handler(Some(Arc::new(move || {
            handler_count.fetch_add(1, Ordering::SeqCst);
        })));
        (waiter, count)
    }

    #[test]
    fn expiry_fires_the_handler_exactly_once() {
        let (mut waiter, count) = counting_waiter();
        waiter.set_timeout(Duration::from_millis(30));

        assert!(waiter.run());
        assert!(waiter.is_running());

        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!waiter.is_running());
    }

    #[test]
    fn cancel_preempts_expiry() {
        let (mut waiter, count) = counting_waiter();
        waiter.set_timeout(Duration::from_millis(50));

        assert!(waiter.run());
        assert!(waiter.cancel());

        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!waiter.is_running());
    }

    #[test]
    fn zero_duration_never_self_expires() {
        let (mut waiter, count) = counting_waiter();
        waiter.set_timeout(Duration::ZERO);

        assert!(waiter.run());
        thread::sleep(Duration::from_millis(100));
        assert!(waiter.is_running());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert!(waiter.cancel());
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_while_running_fails() {
        let (mut waiter, _count) = counting_waiter();
        waiter.set_timeout(Duration::from_millis(200));

        assert!(waiter.run());
        assert!(!waiter.run());
        waiter.cancel();
    }

    #[test]
    fn rerun_after_cancel_is_isolated_from_the_old_thread() {
        let (mut waiter, count) = counting_waiter();
        waiter.set_timeout(Duration::from_millis(40));

        assert!(waiter.run());
        assert!(waiter.cancel());
        assert!(waiter.run());

        thread::sleep(Duration::from_millis(200));
        // Only the second run may fire.
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!waiter.is_running());
    }
}
