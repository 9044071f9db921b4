//! Battery power-source queries and change notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use starship_battery::units::ratio::percent;
use starship_battery::Manager;
use tracing::{debug, trace, warn};

use crate::error::PlatformError;

/// Callback invoked whenever the power source may have changed.
///
/// The notification carries no payload; subscribers re-query the values
/// they care about.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Trait for platform-specific battery power sources.
///
/// Query failures are treated as "no battery", not as errors. Change
/// notifications for one subscription are delivered serially, from a
/// single notifier thread.
pub trait PowerSource: Send + Sync + 'static {
    /// Token representing an active change subscription. Dropping it
    /// signals the notifier to stop (fire-and-forget).
    type Subscription: Send;

    /// Returns true if the host has a battery-type power source.
    fn has_battery(&self) -> bool;

    /// Returns the current battery capacity as a percentage (0-100),
    /// or `None` if no battery or no data is available.
    fn capacity(&self) -> Option<f32>;

    /// Subscribe to power-source change notifications.
    fn subscribe_changes(
        &self,
        callback: ChangeCallback,
    ) -> Result<Self::Subscription, PlatformError>;
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Battery power source backed by `starship-battery`.
///
/// Change notifications are emitted by a polling thread at a bounded
/// interval; value-level debouncing is the subscriber's job.
pub struct SystemPowerSource {
    poll_interval: Duration,
}

impl SystemPowerSource {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for SystemPowerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSource for SystemPowerSource {
    type Subscription = PollSubscription;

    fn has_battery(&self) -> bool {
        Manager::new()
            .ok()
            .and_then(|m| m.batteries().ok())
            .and_then(|mut b| b.next())
            .and_then(|b| b.ok())
            .is_some()
    }

    fn capacity(&self) -> Option<f32> {
        let manager = Manager::new().ok()?;
        let battery = manager.batteries().ok()?.next()?.ok()?;
        Some(battery.state_of_charge().get::<percent>())
    }

    fn subscribe_changes(
        &self,
        callback: ChangeCallback,
    ) -> Result<Self::Subscription, PlatformError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let interval = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("wakeful-power-source".into())
            .spawn(move || {
                debug!("power source notifier started");
                loop {
                    thread::sleep(interval);
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }
                    trace!("power source poll tick");
                    callback();
                }
                debug!("power source notifier stopped");
            });

        if let Err(err) = spawned {
            warn!(error = %err, "could not start the power source notifier");
            return Err(PlatformError::Subscribe(err.to_string()));
        }

        Ok(PollSubscription { stop })
    }
}

/// Active change subscription for [`SystemPowerSource`].
pub struct PollSubscription {
    stop: Arc<AtomicBool>,
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        // Signal only; the notifier thread exits on its next tick.
        self.stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn subscription_notifies_until_dropped() {
        let source = SystemPowerSource::with_poll_interval(Duration::from_millis(5));
        let count = Arc::new(AtomicUsize::new(0));
        let cb_count = count.clone();

        let subscription = source
            .subscribe_changes(Box::new(move || {
                cb_count.fetch_add(1, Ordering::SeqCst);
            }))
            .expect("subscribe");

        std::thread::sleep(Duration::from_millis(60));
        let seen = count.load(Ordering::SeqCst);
        assert!(seen > 0, "expected at least one notification");

        drop(subscription);
        std::thread::sleep(Duration::from_millis(60));
        let after_drop = count.load(Ordering::SeqCst);

        // At most one in-flight tick may land after the drop.
        std::thread::sleep(Duration::from_millis(60));
        assert!(count.load(Ordering::SeqCst) <= after_drop + 1);
    }

    #[test]
    fn capacity_is_none_or_percentage() {
        let source = SystemPowerSource::new();
        if let Some(capacity) = source.capacity() {
            assert!((0.0..=100.0).contains(&capacity));
        }
    }
}
