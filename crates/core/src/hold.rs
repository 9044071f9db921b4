//! All-or-nothing acquisition of idle-sleep prevention grants.

use std::mem;
use std::time::Duration;

use tracing::{debug, warn};
use wakeful_platform::{AssertionKind, SleepInhibitor};

/// Owns zero, one, or two OS sleep-prevention grants.
///
/// The enabled prevention kinds are acquired as a transaction: either
/// every requested grant is held after `run()`, or none is. The hold is
/// running iff at least one grant is held.
pub struct PowerHold<I: SleepInhibitor> {
    label: String,
    timeout: Duration,
    prevent_system_sleep: bool,
    prevent_display_sleep: bool,
    inhibitor: I,
    grants: Vec<(AssertionKind, I::Grant)>,
}

impl<I: SleepInhibitor> PowerHold<I> {
    pub fn new(label: impl Into<String>, inhibitor: I) -> Self {
        Self {
            label: label.into(),
            timeout: Duration::ZERO,
            prevent_system_sleep: false,
            prevent_display_sleep: false,
            inhibitor,
            grants: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Plain setter; the session freezes configuration while running.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn prevent_system_sleep(&self) -> bool {
        self.prevent_system_sleep
    }

    pub fn set_prevent_system_sleep(&mut self, value: bool) {
        self.prevent_system_sleep = value;
    }

    pub fn prevent_display_sleep(&self) -> bool {
        self.prevent_display_sleep
    }

    pub fn set_prevent_display_sleep(&mut self, value: bool) {
        self.prevent_display_sleep = value;
    }

    /// The enabled kinds, in acquisition order.
    fn requested_kinds(&self) -> Vec<AssertionKind> {
        let mut kinds = Vec::new();
        if self.prevent_system_sleep {
            kinds.push(AssertionKind::SystemSleep);
        }
        if self.prevent_display_sleep {
            kinds.push(AssertionKind::DisplaySleep);
        }
        kinds
    }

    pub fn is_running(&self) -> bool {
        !self.grants.is_empty()
    }

    /// Acquire every enabled grant, or none.
    ///
    /// Returns false without side effects if already running. On the
    /// first acquisition failure, every grant acquired during this call
    /// is released before returning false.
    pub fn run(&mut self) -> bool {
        if self.is_running() {
            warn!("a power hold is already running");
            return false;
        }

        if self.timeout.is_zero() {
            debug!("asserting indefinitely");
        } else {
            debug!(timeout_secs = self.timeout.as_secs(), "asserting");
        }

        for kind in self.requested_kinds() {
            debug!(kind = %kind, "preventing user idle sleep");
            match self.inhibitor.acquire(kind, &self.label, self.timeout) {
                Ok(grant) => self.grants.push((kind, grant)),
                Err(err) => {
                    warn!(kind = %kind, error = %err, "acquisition failed, rolling back");
                    self.release_all();
                    return false;
                }
            }
        }
        true
    }

    /// Release every held grant.
    ///
    /// Returns false without any OS call if no grant is held.
    pub fn cancel(&mut self) -> bool {
        if !self.is_running() {
            debug!("cannot cancel, no power hold is running");
            return false;
        }
        self.release_all();
        true
    }

    fn release_all(&mut self) {
        for (kind, grant) in mem::take(&mut self.grants) {
            debug!(kind = %kind, "releasing sleep prevention grant");
            self.inhibitor.release(grant);
        }
    }
}

impl<I: SleepInhibitor> Drop for PowerHold<I> {
    fn drop(&mut self) {
        self.release_all();
    }
}
