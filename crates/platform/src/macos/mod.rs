//! macOS backends built on IOKit.

mod assertion;

pub use assertion::{MacOSGrant, MacOSInhibitor};
