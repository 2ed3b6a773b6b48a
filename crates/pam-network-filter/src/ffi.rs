//! Host ABI: the PAM module descriptor layout, constants, and the
//! `pam_get_item` symbol.
//!
//! Layout follows `struct pam_module` in Linux-PAM's
//! `libpam/include/security/pam_modules.h`.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void, CStr};
use std::marker::{PhantomData, PhantomPinned};
use std::sync::OnceLock;

use netfilter_core::HostItem;

/// Opaque host handle.
#[repr(C)]
pub struct pam_handle_t {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Signature shared by all six entry points.
pub type PamFunction = unsafe extern "C" fn(
    pamh: *mut pam_handle_t,
    flags: c_int,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int;

/// The descriptor table the host reads.
#[repr(C)]
pub struct PamModule {
    pub name: *const c_char,
    pub pam_sm_authenticate: Option<PamFunction>,
    pub pam_sm_setcred: Option<PamFunction>,
    pub pam_sm_acct_mgmt: Option<PamFunction>,
    pub pam_sm_open_session: Option<PamFunction>,
    pub pam_sm_close_session: Option<PamFunction>,
    pub pam_sm_chauthtok: Option<PamFunction>,
}

// SAFETY: `name` points at a 'static C string literal and the table is
// never written after initialisation.
unsafe impl Sync for PamModule {}

pub const PAM_SUCCESS: c_int = 0;
pub const PAM_SYSTEM_ERR: c_int = 4;
pub const PAM_PERM_DENIED: c_int = 6;
pub const PAM_BUF_ERR: c_int = 5;
pub const PAM_IGNORE: c_int = 25;
pub const PAM_BAD_ITEM: c_int = 29;

pub const PAM_SERVICE: c_int = 1;
pub const PAM_USER: c_int = 2;
pub const PAM_TTY: c_int = 3;
pub const PAM_RHOST: c_int = 4;
pub const PAM_RUSER: c_int = 8;

/// Item type constant for a host item.
pub fn item_type(item: HostItem) -> c_int {
    match item {
        HostItem::Service => PAM_SERVICE,
        HostItem::User => PAM_USER,
        HostItem::Tty => PAM_TTY,
        HostItem::Rhost => PAM_RHOST,
        HostItem::Ruser => PAM_RUSER,
    }
}

/// Text for a `pam_get_item` failure code.
pub fn item_error_message(code: c_int) -> String {
    match code {
        PAM_BAD_ITEM => "undefined or inaccessible item".to_owned(),
        PAM_PERM_DENIED => "item value pointer is NULL".to_owned(),
        PAM_SYSTEM_ERR => "wrong PAM handle".to_owned(),
        PAM_BUF_ERR => "memory buffer error".to_owned(),
        other => format!("unknown error {}", other),
    }
}

pub type PamGetItemFn =
    unsafe extern "C" fn(pamh: *const pam_handle_t, item_type: c_int, item: *mut *const c_void) -> c_int;

static PAM_GET_ITEM: OnceLock<Option<PamGetItemFn>> = OnceLock::new();

/// `pam_get_item` from the host process, if it is loaded.
///
/// The module is dlopen()ed by libpam, so the symbol is taken from the
/// running process instead of linking against libpam. Looked up once.
pub fn pam_get_item() -> Option<PamGetItemFn> {
    *PAM_GET_ITEM.get_or_init(|| {
        let name = c"pam_get_item";
        lookup(libc::RTLD_DEFAULT, name).or_else(|| {
            // libpam opened with RTLD_LOCAL is not in the global scope;
            // RTLD_NOLOAD only returns a handle if it is already mapped.
            let lib = unsafe { libc::dlopen(c"libpam.so.0".as_ptr(), libc::RTLD_NOW | libc::RTLD_NOLOAD) };
            if lib.is_null() {
                return None;
            }
            lookup(lib, name)
        })
    })
}

fn lookup(handle: *mut c_void, name: &CStr) -> Option<PamGetItemFn> {
    // SAFETY: `name` is NUL-terminated; `handle` is RTLD_DEFAULT or a live
    // dlopen handle.
    let sym = unsafe { libc::dlsym(handle, name.as_ptr()) };
    if sym.is_null() {
        None
    } else {
        // SAFETY: the exported `pam_get_item` has exactly this signature.
        Some(unsafe { std::mem::transmute::<*mut c_void, PamGetItemFn>(sym) })
    }
}
