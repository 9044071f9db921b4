//! Session coordination for wakeful.
//!
//! This crate binds three independently-lived, asynchronously-signaled
//! resources into one keep-awake session:
//!
//! - [`PowerHold`] owns the OS sleep-prevention grants,
//! - [`ThreadWaiter`] fires a callback after a configured duration,
//! - [`BatteryMonitor`] observes battery capacity changes.
//!
//! [`Session`] composes the three behind a single run/cancel state
//! machine and wires the waiter's expiry and the monitor's threshold
//! crossing to a shared, idempotent cancellation path. The OS calls
//! themselves live behind the `wakeful-platform` traits.

mod hold;
mod monitor;
mod session;
mod waiter;

pub use hold::PowerHold;
pub use monitor::{BatteryMonitor, CapacityHandler, CAPACITY_UNAVAILABLE};
pub use session::{Session, INFINITE_TIMEOUT};
pub use waiter::{ThreadWaiter, TimeoutHandler, Waiter};

#[cfg(test)]
pub(crate) mod testing;

/// The library version, used for `--version` output.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
