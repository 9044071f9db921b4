//! Battery capacity observation with value-level debouncing.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use wakeful_platform::PowerSource;

/// Sentinel reported when no capacity reading is available.
pub const CAPACITY_UNAVAILABLE: f32 = -1.0;

/// Callback invoked with each newly observed capacity percentage.
pub type CapacityHandler = Arc<dyn Fn(f32) + Send + Sync>;

struct Observed {
    last_capacity: Mutex<f32>,
    handler: Mutex<Option<CapacityHandler>>,
}

/// Reports battery capacity and delivers capacity-change events.
///
/// While registered, every power-source notification triggers a fresh
/// capacity query; the handler is invoked only when the value differs
/// from the last observed one, so repeated notifications carrying the
/// same value stay silent. Delivery is serial per instance.
pub struct BatteryMonitor<P: PowerSource> {
    source: Arc<P>,
    observed: Arc<Observed>,
    subscription: Option<P::Subscription>,
}

impl<P: PowerSource> BatteryMonitor<P> {
    pub fn new(source: Arc<P>) -> Self {
        Self {
            source,
            observed: Arc::new(Observed {
                last_capacity: Mutex::new(CAPACITY_UNAVAILABLE),
                handler: Mutex::new(None),
            }),
            subscription: None,
        }
    }

    /// Returns true if the host has a battery; query failures count as
    /// "no battery".
    pub fn has_battery(&self) -> bool {
        self.source.has_battery()
    }

    /// Current capacity percentage, or [`CAPACITY_UNAVAILABLE`].
    pub fn capacity(&self) -> f32 {
        self.source.capacity().unwrap_or(CAPACITY_UNAVAILABLE)
    }

    /// Passing `None` detaches the previously installed handler.
    pub fn set_capacity_change_handler(&self, handler: Option<CapacityHandler>) {
        *self.observed.handler.lock().unwrap() = handler;
    }

    pub fn is_registered(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to power-source change notifications.
    ///
    /// Returns false if already registered, or if the subscription could
    /// not be established.
    pub fn register_for_capacity_changes(&mut self) -> bool {
        if self.subscription.is_some() {
            warn!("already registered for capacity changes");
            return false;
        }

        let source = self.source.clone();
        let observed = self.observed.clone();
        let callback = Box::new(move || {
            let capacity = source.capacity().unwrap_or(CAPACITY_UNAVAILABLE);
            let changed = {
                let mut last = observed.last_capacity.lock().unwrap();
                if (*last - capacity).abs() > f32::EPSILON {
                    *last = capacity;
                    true
                } else {
                    false
                }
            };
            if !changed {
                return;
            }
            debug!(capacity, "battery capacity changed");
            // Clone out of the lock so a handler that detaches itself
            // cannot deadlock.
            let handler = observed.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                handler(capacity);
            }
        });

        match self.source.subscribe_changes(callback) {
            Ok(subscription) => {
                debug!("registered for capacity changes");
                self.subscription = Some(subscription);
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to register for capacity changes");
                false
            }
        }
    }

    /// Tear down the subscription and reset the last observed capacity.
    ///
    /// Returns false if not registered.
    pub fn unregister_from_capacity_changes(&mut self) -> bool {
        if self.subscription.take().is_none() {
            debug!("not registered for capacity changes");
            return false;
        }
        *self.observed.last_capacity.lock().unwrap() = CAPACITY_UNAVAILABLE;
        debug!("unregistered from capacity changes");
        true
    }
}
