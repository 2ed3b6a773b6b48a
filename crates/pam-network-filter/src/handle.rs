//! Safe views over what the host passes to an entry point.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;

use netfilter_core::{HostItem, ItemError, ItemSource};

use crate::ffi::{self, pam_handle_t, PAM_SUCCESS};

/// Item access through a host handle.
///
/// A null handle reports [`ItemError::NoHandle`] for every item, so a call
/// with no handle never reaches `pam_get_item`.
pub struct PamHandle {
    raw: *mut pam_handle_t,
}

impl PamHandle {
    pub fn new(raw: *mut pam_handle_t) -> Self {
        Self { raw }
    }
}

impl ItemSource for PamHandle {
    fn item(&self, item: HostItem) -> Result<Option<String>, ItemError> {
        if self.raw.is_null() {
            return Err(ItemError::NoHandle);
        }

        let get_item = ffi::pam_get_item().ok_or_else(|| ItemError::Unavailable {
            item: item.name(),
            reason: "pam_get_item is not loaded in this process".to_string(),
        })?;

        let mut value: *const c_void = ptr::null();
        // SAFETY: the handle is non-null and owned by the host for the
        // duration of this call; `value` is a valid out-pointer.
        let ret = unsafe { get_item(self.raw, ffi::item_type(item), &mut value) };
        if ret != PAM_SUCCESS {
            return Err(ItemError::Unavailable {
                item: item.name(),
                reason: ffi::item_error_message(ret),
            });
        }
        if value.is_null() {
            return Ok(None);
        }

        // SAFETY: string items are NUL-terminated and stay valid until the
        // host changes them, which cannot happen during this call.
        let text = unsafe { CStr::from_ptr(value.cast::<c_char>()) };
        Ok(Some(text.to_string_lossy().into_owned()))
    }
}

/// Copy the host's argument vector.
///
/// A null `argv`, a non-positive `argc`, or null elements yield fewer
/// arguments rather than a fault.
///
/// # Safety
///
/// When non-null, `argv` must point to `argc` pointers, each null or a
/// NUL-terminated string.
pub unsafe fn collect_args(argc: c_int, argv: *const *const c_char) -> Vec<String> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }

    let raw = std::slice::from_raw_parts(argv, argc as usize);
    raw.iter()
        .filter(|arg| !arg.is_null())
        .map(|&arg| CStr::from_ptr(arg).to_string_lossy().into_owned())
        .collect()
}
