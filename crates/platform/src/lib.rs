//! OS power-management collaborators for wakeful.
//!
//! This crate defines the platform contracts the coordination core builds
//! on: [`SleepInhibitor`] for acquiring and releasing idle-sleep prevention
//! grants, and [`PowerSource`] for battery capacity queries and
//! asynchronous change notifications.
//!
//! # Features
//!
//! - `macos` - Enable the native IOKit power-assertion backend
//!
//! On other targets sleep inhibition is provided by the `keepawake` crate
//! via [`portable::PortableInhibitor`].
//!
//! # Example
//!
//! ```ignore
//! use wakeful_platform::{AssertionKind, SleepInhibitor, SystemPowerSource};
//!
//! #[cfg(target_os = "macos")]
//! use wakeful_platform::macos::MacOSInhibitor;
//!
//! let inhibitor = MacOSInhibitor::new();
//! let grant = inhibitor.acquire(
//!     AssertionKind::SystemSleep,
//!     "my tool",
//!     std::time::Duration::ZERO,
//! )?;
//! inhibitor.release(grant);
//! ```

mod battery;
mod error;
mod inhibit;

pub use battery::{ChangeCallback, PollSubscription, PowerSource, SystemPowerSource};
pub use error::PlatformError;
pub use inhibit::{AssertionKind, SleepInhibitor};

#[cfg(target_os = "macos")]
#[cfg(feature = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod portable;
