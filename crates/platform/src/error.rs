//! Errors surfaced by the OS collaborator layer.

use thiserror::Error;

use crate::inhibit::AssertionKind;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The OS refused to create a sleep-prevention assertion.
    #[error("the system refused the {kind} assertion (status {status})")]
    AssertionRefused { kind: AssertionKind, status: i32 },

    /// No sleep-inhibition facility is usable on this host.
    #[error("sleep inhibition unavailable: {0}")]
    InhibitUnavailable(String),

    /// The power-source change notifier could not be started.
    #[error("failed to subscribe to power source changes: {0}")]
    Subscribe(String),

    /// A battery query failed at the OS level.
    #[error("battery query failed: {0}")]
    Battery(#[from] starship_battery::Error),
}
