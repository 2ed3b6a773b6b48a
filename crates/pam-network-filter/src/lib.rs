//! # pam_network_filter
//!
//! Loadable PAM module. The host finds the descriptor table
//! `_pam_listfile_modstruct` (or the individual `pam_sm_*` symbols) and
//! calls into it; every call is routed to the [`netfilter_core::Dispatcher`].
//!
//! ## Descriptor
//!
//! | Slot | `optional-phases` on (default) | `optional-phases` off |
//! |------|--------------------------------|-----------------------|
//! | `name` | `"pam_network_filter"` | `"pam_network_filter"` |
//! | `pam_sm_authenticate` | match | match |
//! | `pam_sm_setcred` | match | match |
//! | `pam_sm_acct_mgmt` | `PAM_IGNORE` | null |
//! | `pam_sm_open_session` | `PAM_IGNORE` | null |
//! | `pam_sm_close_session` | `PAM_IGNORE` | null |
//! | `pam_sm_chauthtok` | `PAM_IGNORE` | null |
//!
//! ## Usage
//!
//! ```text
//! auth  required  pam_network_filter.so item=rhost file=/etc/security/hosts.rules onerr=fail
//! ```
//!
//! ## Security Notes
//!
//! - A panic inside an entry point is caught and reported as `PAM_PERM_DENIED`
//! - No state is kept between calls; rule files are re-read each time
//! - A null handle or null `argv` is tolerated and never dereferenced

pub mod ffi;
mod handle;
mod logging;

use std::ffi::{c_char, c_int, CStr};
use std::panic::{self, AssertUnwindSafe};

use netfilter_core::{Dispatcher, ModuleArgs, Phase, RequestContext, ResultCode};
use tracing::{debug, error};

pub use ffi::{pam_handle_t, PamFunction, PamModule};
pub use handle::{collect_args, PamHandle};
pub use logging::{SyslogMakeWriter, SyslogWriter, LOG_ENV};

/// Name the host reports for this module.
pub const MODULE_NAME: &CStr = c"pam_network_filter";

/// Descriptor table read by hosts that link modules statically.
#[allow(non_upper_case_globals)]
#[no_mangle]
pub static _pam_listfile_modstruct: PamModule = PamModule {
    name: MODULE_NAME.as_ptr(),
    pam_sm_authenticate: Some(pam_sm_authenticate),
    pam_sm_setcred: Some(pam_sm_setcred),
    pam_sm_acct_mgmt: optional::ACCT_MGMT,
    pam_sm_open_session: optional::OPEN_SESSION,
    pam_sm_close_session: optional::CLOSE_SESSION,
    pam_sm_chauthtok: optional::CHAUTHTOK,
};

#[cfg(feature = "optional-phases")]
mod optional {
    use crate::ffi::PamFunction;

    pub const ACCT_MGMT: Option<PamFunction> = Some(crate::pam_sm_acct_mgmt);
    pub const OPEN_SESSION: Option<PamFunction> = Some(crate::pam_sm_open_session);
    pub const CLOSE_SESSION: Option<PamFunction> = Some(crate::pam_sm_close_session);
    pub const CHAUTHTOK: Option<PamFunction> = Some(crate::pam_sm_chauthtok);
}

#[cfg(not(feature = "optional-phases"))]
mod optional {
    use crate::ffi::PamFunction;

    pub const ACCT_MGMT: Option<PamFunction> = None;
    pub const OPEN_SESSION: Option<PamFunction> = None;
    pub const CLOSE_SESSION: Option<PamFunction> = None;
    pub const CHAUTHTOK: Option<PamFunction> = None;
}

/// Match the configured item against the rules.
#[no_mangle]
pub extern "C" fn pam_sm_authenticate(
    pamh: *mut pam_handle_t,
    flags: c_int,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    run_matching(Phase::Authenticate, pamh, flags, argc, argv)
}

/// Same decision as [`pam_sm_authenticate`].
#[no_mangle]
pub extern "C" fn pam_sm_setcred(
    pamh: *mut pam_handle_t,
    flags: c_int,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    run_matching(Phase::Setcred, pamh, flags, argc, argv)
}

#[cfg(feature = "optional-phases")]
#[no_mangle]
pub extern "C" fn pam_sm_acct_mgmt(
    _pamh: *mut pam_handle_t,
    _flags: c_int,
    _argc: c_int,
    _argv: *const *const c_char,
) -> c_int {
    not_applicable(Phase::AcctMgmt)
}

#[cfg(feature = "optional-phases")]
#[no_mangle]
pub extern "C" fn pam_sm_open_session(
    _pamh: *mut pam_handle_t,
    _flags: c_int,
    _argc: c_int,
    _argv: *const *const c_char,
) -> c_int {
    not_applicable(Phase::OpenSession)
}

#[cfg(feature = "optional-phases")]
#[no_mangle]
pub extern "C" fn pam_sm_close_session(
    _pamh: *mut pam_handle_t,
    _flags: c_int,
    _argc: c_int,
    _argv: *const *const c_char,
) -> c_int {
    not_applicable(Phase::CloseSession)
}

#[cfg(feature = "optional-phases")]
#[no_mangle]
pub extern "C" fn pam_sm_chauthtok(
    _pamh: *mut pam_handle_t,
    _flags: c_int,
    _argc: c_int,
    _argv: *const *const c_char,
) -> c_int {
    not_applicable(Phase::Chauthtok)
}

fn run_matching(
    phase: Phase,
    pamh: *mut pam_handle_t,
    flags: c_int,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    guarded(phase, || {
        // SAFETY: the host passes `argc` C strings in `argv`; null is handled.
        let args = unsafe { collect_args(argc, argv) };
        logging::with_module_logging(ModuleArgs::wants_debug(&args), || {
            let handle = PamHandle::new(pamh);
            let ctx = RequestContext::new(phase, flags, &args, &handle);
            debug!("{:?}", ctx);
            Dispatcher::new().dispatch(&ctx)
        })
    })
}

#[cfg(feature = "optional-phases")]
fn not_applicable(phase: Phase) -> c_int {
    guarded(phase, || {
        logging::with_module_logging(false, || {
            debug!("feature '{}' not implemented", phase.symbol());
            ResultCode::Ignore
        })
    })
}

/// Keep unwinding out of the host.
fn guarded(phase: Phase, f: impl FnOnce() -> ResultCode) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(code) => code.as_raw(),
        Err(_) => {
            let _ = panic::catch_unwind(|| {
                logging::with_module_logging(false, || {
                    error!("{}: internal error, denying", phase.symbol())
                })
            });
            ResultCode::PermissionDenied.as_raw()
        }
    }
}
