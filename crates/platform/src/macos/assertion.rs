//! IOKit power-assertion acquisition and release.

use std::ptr;
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::string::CFString;
use core_foundation_sys::string::CFStringRef;
use tracing::debug;

use crate::error::PlatformError;
use crate::inhibit::{AssertionKind, SleepInhibitor};

type IOPMAssertionID = u32;
type IOReturn = i32;

const IO_RETURN_SUCCESS: IOReturn = 0;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IOPMAssertionCreateWithDescription(
        assertion_type: CFStringRef,
        name: CFStringRef,
        details: CFStringRef,
        human_readable_reason: CFStringRef,
        localization_bundle_path: CFStringRef,
        timeout: f64,
        timeout_action: CFStringRef,
        assertion_id: *mut IOPMAssertionID,
    ) -> IOReturn;

    fn IOPMAssertionRelease(assertion_id: IOPMAssertionID) -> IOReturn;
}

fn assertion_type_name(kind: AssertionKind) -> &'static str {
    match kind {
        AssertionKind::SystemSleep => "PreventUserIdleSystemSleep",
        AssertionKind::DisplaySleep => "PreventUserIdleDisplaySleep",
    }
}

/// An acquired IOKit power assertion, identified by its opaque id.
#[derive(Debug)]
pub struct MacOSGrant {
    id: IOPMAssertionID,
    kind: AssertionKind,
}

/// Sleep inhibitor backed by `IOPMAssertionCreateWithDescription`.
///
/// A nonzero timeout is forwarded to the OS with `TimeoutActionRelease`,
/// so the assertion auto-releases even if the process never cancels it.
pub struct MacOSInhibitor;

impl MacOSInhibitor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacOSInhibitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepInhibitor for MacOSInhibitor {
    type Grant = MacOSGrant;

    fn acquire(
        &self,
        kind: AssertionKind,
        label: &str,
        timeout: Duration,
    ) -> Result<Self::Grant, PlatformError> {
        let assertion_type = CFString::from_static_string(assertion_type_name(kind));
        let name = CFString::new(label);
        let details = CFString::new(&format!("preventing user idle {}", kind.label()));
        let timeout_action = CFString::from_static_string("TimeoutActionRelease");
        let mut assertion_id: IOPMAssertionID = 0;

        let status = unsafe {
            IOPMAssertionCreateWithDescription(
                assertion_type.as_concrete_TypeRef(),
                name.as_concrete_TypeRef(),
                details.as_concrete_TypeRef(),
                ptr::null(),
                ptr::null(),
                timeout.as_secs_f64(),
                timeout_action.as_concrete_TypeRef(),
                &mut assertion_id,
            )
        };

        if status == IO_RETURN_SUCCESS {
            debug!(kind = %kind, id = assertion_id, "acquired power assertion");
            Ok(MacOSGrant {
                id: assertion_id,
                kind,
            })
        } else {
            Err(PlatformError::AssertionRefused { kind, status })
        }
    }

    fn release(&self, grant: Self::Grant) {
        debug!(kind = %grant.kind, id = grant.id, "releasing power assertion");
        unsafe {
            IOPMAssertionRelease(grant.id);
        }
    }
}
