//! Portable sleep inhibition built on the `keepawake` crate.
//!
//! Used on targets without a native backend. There is no OS-level
//! auto-release here; the application-level waiter is the only timeout
//! mechanism on these platforms.

use std::time::Duration;

use tracing::debug;

use crate::error::PlatformError;
use crate::inhibit::{AssertionKind, SleepInhibitor};

pub struct PortableInhibitor {
    app_name: String,
}

impl PortableInhibitor {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl SleepInhibitor for PortableInhibitor {
    type Grant = keepawake::KeepAwake;

    fn acquire(
        &self,
        kind: AssertionKind,
        label: &str,
        timeout: Duration,
    ) -> Result<Self::Grant, PlatformError> {
        if !timeout.is_zero() {
            debug!(
                timeout_secs = timeout.as_secs(),
                "no OS-level auto-release on this platform, relying on the waiter"
            );
        }

        let display = matches!(kind, AssertionKind::DisplaySleep);
        keepawake::Builder::default()
            .display(display)
            .idle(!display)
            .sleep(!display)
            .reason(format!("preventing user idle {}", kind.label()))
            .app_name(self.app_name.clone())
            .app_reverse_domain("sh.wakeful.cli")
            .create()
            .map_err(|e| PlatformError::InhibitUnavailable(e.to_string()))
    }

    fn release(&self, grant: Self::Grant) {
        debug!("releasing keepawake guard");
        drop(grant);
    }
}
