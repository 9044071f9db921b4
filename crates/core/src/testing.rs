//! Scripted platform doubles shared across the core's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wakeful_platform::{
    AssertionKind, ChangeCallback, PlatformError, PowerSource, SleepInhibitor,
};

/// Observable state of a [`MockInhibitor`], shared with the test body.
#[derive(Default)]
pub struct InhibitorState {
    fail_kinds: Mutex<Vec<AssertionKind>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    live: Mutex<Vec<AssertionKind>>,
}

impl InhibitorState {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Kinds currently held, in acquisition order.
    pub fn live(&self) -> Vec<AssertionKind> {
        self.live.lock().unwrap().clone()
    }
}

/// Inhibitor that records acquisitions and can fail scripted kinds.
pub struct MockInhibitor {
    state: Arc<InhibitorState>,
}

impl MockInhibitor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(InhibitorState::default()),
        }
    }

    /// Inhibitor that refuses the given kinds.
    pub fn failing(kinds: &[AssertionKind]) -> Self {
        let inhibitor = Self::new();
        *inhibitor.state.fail_kinds.lock().unwrap() = kinds.to_vec();
        inhibitor
    }

    pub fn state(&self) -> Arc<InhibitorState> {
        self.state.clone()
    }
}

impl SleepInhibitor for MockInhibitor {
    type Grant = AssertionKind;

    fn acquire(
        &self,
        kind: AssertionKind,
        _label: &str,
        _timeout: Duration,
    ) -> Result<Self::Grant, PlatformError> {
        if self.state.fail_kinds.lock().unwrap().contains(&kind) {
            return Err(PlatformError::InhibitUnavailable(format!(
                "scripted failure for {kind}"
            )));
        }
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        self.state.live.lock().unwrap().push(kind);
        Ok(kind)
    }

    fn release(&self, grant: Self::Grant) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
        let mut live = self.state.live.lock().unwrap();
        if let Some(index) = live.iter().position(|kind| *kind == grant) {
            live.remove(index);
        }
    }
}

type SharedCallback = Arc<Mutex<Option<Arc<dyn Fn() + Send + Sync>>>>;

/// Power source driven manually from the test body.
pub struct MockPowerSource {
    has_battery: bool,
    capacity: Mutex<Option<f32>>,
    callback: SharedCallback,
}

impl MockPowerSource {
    pub fn new(has_battery: bool, capacity: Option<f32>) -> Arc<Self> {
        Arc::new(Self {
            has_battery,
            capacity: Mutex::new(capacity),
            callback: Arc::new(Mutex::new(None)),
        })
    }

    pub fn set_capacity(&self, capacity: Option<f32>) {
        *self.capacity.lock().unwrap() = capacity;
    }

    /// Deliver one change notification, synchronously.
    pub fn notify(&self) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }
}

impl PowerSource for MockPowerSource {
    type Subscription = MockSubscription;

    fn has_battery(&self) -> bool {
        self.has_battery
    }

    fn capacity(&self) -> Option<f32> {
        *self.capacity.lock().unwrap()
    }

    fn subscribe_changes(
        &self,
        callback: ChangeCallback,
    ) -> Result<Self::Subscription, PlatformError> {
        *self.callback.lock().unwrap() = Some(Arc::from(callback));
        Ok(MockSubscription {
            slot: self.callback.clone(),
        })
    }
}

/// Dropping the token detaches the stored callback, mirroring the
/// fire-and-forget teardown of the real sources.
pub struct MockSubscription {
    slot: SharedCallback,
}

impl Drop for MockSubscription {
    fn drop(&mut self) {
        self.slot.lock().unwrap().take();
    }
}
