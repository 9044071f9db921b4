//! The keep-awake session: one run/cancel state machine over the power
//! hold, the timeout waiter, and the battery monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};
use wakeful_platform::{PowerSource, SleepInhibitor};

use crate::hold::PowerHold;
use crate::monitor::{BatteryMonitor, CapacityHandler};
use crate::waiter::{ThreadWaiter, TimeoutHandler, Waiter};

/// A timeout of zero keeps the machine awake indefinitely.
pub const INFINITE_TIMEOUT: Duration = Duration::ZERO;

/// Capacity thresholds above this are hardware-dependent and may never
/// be observed as a distinct change.
const RELIABLE_THRESHOLD_LIMIT: f32 = 95.0;

/// One coordinated keep-awake run.
///
/// A session owns exactly one [`PowerHold`], one [`Waiter`], and one
/// [`BatteryMonitor`], and wires the waiter's expiry and the monitor's
/// threshold crossing to a shared, idempotent cancellation path. The
/// session is running iff the power hold is running; re-running after a
/// cancel is allowed, since every leaf resets fully.
///
/// The configured timeout is deliberately enforced twice: forwarded to
/// the OS grant (auto-release) and to the waiter (application callback).
/// Both always carry the same value.
pub struct Session<I: SleepInhibitor, P: PowerSource> {
    inner: Arc<Inner<I, P>>,
    minimum_battery_capacity: Option<f32>,
    timeout_handler: Option<TimeoutHandler>,
    battery_handler: Option<CapacityHandler>,
}

/// Shared leaf state; background callbacks reach it through `Weak`
/// references so nothing outlives the session.
struct Inner<I: SleepInhibitor, P: PowerSource> {
    hold: Mutex<PowerHold<I>>,
    waiter: Mutex<Box<dyn Waiter>>,
    monitor: Mutex<BatteryMonitor<P>>,
}

impl<I: SleepInhibitor, P: PowerSource> Inner<I, P> {
    /// Tears down all three leaves. Safe to call redundantly and from
    /// concurrent callback paths; leaf-level "was not running" results
    /// are logged, never propagated.
    fn cancel(&self) {
        if !self.waiter.lock().unwrap().cancel() {
            warn!("failed to cancel the timeout waiter");
        }
        if !self.hold.lock().unwrap().cancel() {
            debug!("no power hold was running");
        }

        let mut monitor = self.monitor.lock().unwrap();
        monitor.set_capacity_change_handler(None);
        // Tear the subscription down fully so no OS-level registration
        // outlives the session.
        if monitor.is_registered() && !monitor.unregister_from_capacity_changes() {
            warn!("failed to unregister from capacity changes");
        }
    }
}

impl<I: SleepInhibitor, P: PowerSource> Session<I, P> {
    /// Creates a session with the default thread-based waiter.
    ///
    /// `name` is the OS-visible label attached to sleep assertions.
    pub fn new(name: impl Into<String>, inhibitor: I, source: Arc<P>) -> Self {
        Self::with_waiter(name, inhibitor, source, Box::new(ThreadWaiter::new()))
    }

    /// Creates a session with an explicit waiter strategy.
    pub fn with_waiter(
        name: impl Into<String>,
        inhibitor: I,
        source: Arc<P>,
        waiter: Box<dyn Waiter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                hold: Mutex::new(PowerHold::new(name, inhibitor)),
                waiter: Mutex::new(waiter),
                monitor: Mutex::new(BatteryMonitor::new(source)),
            }),
            minimum_battery_capacity: None,
            timeout_handler: None,
            battery_handler: None,
        }
    }

    /// The tool name used for OS-visible labeling.
    pub fn name(&self) -> String {
        self.inner.hold.lock().unwrap().label().to_string()
    }

    pub fn is_running(&self) -> bool {
        self.inner.hold.lock().unwrap().is_running()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.hold.lock().unwrap().timeout()
    }

    /// Sets the timeout for both the OS grant and the waiter.
    ///
    /// Fails while the session is running.
    pub fn set_timeout(&mut self, timeout: Duration) -> bool {
        if self.is_running() {
            warn!("the timeout cannot be modified while running");
            return false;
        }
        self.inner.waiter.lock().unwrap().set_timeout(timeout);
        self.inner.hold.lock().unwrap().set_timeout(timeout);
        true
    }

    pub fn prevent_system_sleep(&self) -> bool {
        self.inner.hold.lock().unwrap().prevent_system_sleep()
    }

    /// Fails while the session is running.
    pub fn set_prevent_system_sleep(&mut self, value: bool) -> bool {
        if self.is_running() {
            warn!("the system sleep flag cannot be modified while running");
            return false;
        }
        self.inner.hold.lock().unwrap().set_prevent_system_sleep(value);
        true
    }

    pub fn prevent_display_sleep(&self) -> bool {
        self.inner.hold.lock().unwrap().prevent_display_sleep()
    }

    /// Fails while the session is running.
    pub fn set_prevent_display_sleep(&mut self, value: bool) -> bool {
        if self.is_running() {
            warn!("the display sleep flag cannot be modified while running");
            return false;
        }
        self.inner.hold.lock().unwrap().set_prevent_display_sleep(value);
        true
    }

    /// Handler invoked when the timeout expires. When none is set, the
    /// session cancels itself on expiry instead.
    pub fn set_timeout_handler(&mut self, handler: Option<TimeoutHandler>) {
        self.timeout_handler = handler;
    }

    pub fn has_battery(&self) -> bool {
        self.inner.monitor.lock().unwrap().has_battery()
    }

    pub fn minimum_battery_capacity(&self) -> Option<f32> {
        self.minimum_battery_capacity
    }

    /// Sets the capacity percentage at or below which the session
    /// releases its hold early. Takes effect on the next `run()`.
    pub fn set_minimum_battery_capacity(&mut self, capacity: Option<f32>) {
        if let Some(threshold) = capacity {
            if threshold > RELIABLE_THRESHOLD_LIMIT {
                warn!(
                    threshold,
                    "capacity thresholds above {RELIABLE_THRESHOLD_LIMIT}% are hardware-dependent and may never fire"
                );
            }
        }
        self.minimum_battery_capacity = capacity;
    }

    /// Handler invoked once when the capacity threshold is crossed,
    /// right before the session cancels itself.
    pub fn set_battery_threshold_handler(&mut self, handler: Option<CapacityHandler>) {
        self.battery_handler = handler;
    }

    /// Starts the waiter, then the power hold, then (if configured and a
    /// battery is present) the capacity guard.
    ///
    /// If the hold fails, the already-started waiter is cancelled and
    /// `run` returns false, so no half-started session survives.
    pub fn run(&mut self) -> bool {
        let expiry = self.expiry_handler();
        {
            let mut waiter = self.inner.waiter.lock().unwrap();
            waiter.set_timeout_handler(Some(expiry));
            if !waiter.run() {
                warn!("failed to start the timeout waiter");
                return false;
            }
        }

        if !self.inner.hold.lock().unwrap().run() {
            warn!("failed to start the power hold");
            self.inner.waiter.lock().unwrap().cancel();
            return false;
        }

        if let Some(threshold) = self.minimum_battery_capacity {
            self.arm_battery_guard(threshold);
        }
        true
    }

    /// Tears down all three leaves. Safe to call when already idle.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    fn expiry_handler(&self) -> TimeoutHandler {
        let inner = Arc::downgrade(&self.inner);
        let handler = self.timeout_handler.clone();
        Arc::new(move || {
            info!("keep-awake timeout expired");
            match &handler {
                Some(handler) => handler(),
                None => cancel_upgraded(&inner),
            }
        })
    }

    fn arm_battery_guard(&self, threshold: f32) {
        let mut monitor = self.inner.monitor.lock().unwrap();
        if !monitor.has_battery() {
            // Documented behavior: a threshold without a battery is inert.
            info!("no battery present, the capacity threshold stays inert");
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        let handler = self.battery_handler.clone();
        let fired = AtomicBool::new(false);
        monitor.set_capacity_change_handler(Some(Arc::new(move |capacity| {
            if capacity < 0.0 {
                // Unavailable sentinel, not a reading.
                return;
            }
            if capacity > threshold {
                debug!(capacity, threshold, "capacity above the threshold");
                return;
            }
            // Claim the crossing so racing notifications fire it once.
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            info!(capacity, threshold, "battery capacity reached the threshold");
            if let Some(handler) = &handler {
                handler(capacity);
            }
            cancel_upgraded(&inner);
        })));

        if !monitor.register_for_capacity_changes() {
            warn!("failed to observe battery capacity changes");
        }
    }
}

fn cancel_upgraded<I: SleepInhibitor, P: PowerSource>(inner: &Weak<Inner<I, P>>) {
    if let Some(inner) = inner.upgrade() {
        inner.cancel();
    }
}
