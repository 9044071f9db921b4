//! Sleep-inhibition traits and types.

use std::fmt;
use std::time::Duration;

use crate::error::PlatformError;

/// The idle-sleep modes a grant can prevent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// Prevent the system from idle sleeping.
    SystemSleep,
    /// Prevent the display from dimming and idle sleeping.
    DisplaySleep,
}

impl AssertionKind {
    /// Returns a human-readable label for the assertion kind.
    pub fn label(&self) -> &'static str {
        match self {
            AssertionKind::SystemSleep => "system sleep",
            AssertionKind::DisplaySleep => "display sleep",
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Trait for platform-specific sleep inhibitors.
///
/// A grant is an opaque token for one OS-level "keep awake" assertion.
/// Grants are acquired one kind at a time; releasing consumes the token,
/// so a grant can never be released twice.
pub trait SleepInhibitor: Send + Sync + 'static {
    /// Opaque handle for an acquired assertion.
    type Grant: Send;

    /// Acquire a sleep-prevention grant of the given kind.
    ///
    /// `label` is the caller-visible name attached to the assertion.
    /// A zero `timeout` holds the grant indefinitely; a nonzero timeout
    /// asks the OS to auto-release after that duration.
    fn acquire(
        &self,
        kind: AssertionKind,
        label: &str,
        timeout: Duration,
    ) -> Result<Self::Grant, PlatformError>;

    /// Release a previously acquired grant.
    fn release(&self, grant: Self::Grant);
}
