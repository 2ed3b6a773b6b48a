//! # Netfilter Core
//!
//! Host-independent half of the `pam_network_filter` module: module
//! argument parsing, request items, name resolution, and the phase
//! dispatcher that turns a request into a host result code.
//!
//! ## Control Flow
//!
//! ```text
//! entry point ──▶ Dispatcher ──▶ ModuleArgs::parse
//!                     │      ──▶ build_store (files + inline rules)
//!                     │      ──▶ candidate (item + resolver)
//!                     ▼
//!               MatchEngine::decide ──▶ Verdict ──▶ ResultCode
//! ```
//!
//! ## Phase Contract
//!
//! | Phase | Behavior |
//! |-------|----------|
//! | `authenticate`, `setcred` | Match; Allow → `PAM_SUCCESS`, Deny → `PAM_PERM_DENIED`, Indeterminate → `onerr` |
//! | `acct_mgmt`, `open_session`, `close_session`, `chauthtok` | Always `PAM_IGNORE` |
//!
//! ## Security Notes
//!
//! - Fail-closed: without `onerr`, any indeterminate outcome is `PAM_PERM_DENIED`
//! - No rule matched means deny unless `default=allow` is configured
//! - Rule files are only ever read

mod config;
mod context;
mod dispatcher;
mod error;
mod phase;
mod resolve;

pub use config::{HostItem, Item, ModuleArgs, OnErr, RuleSource};
pub use context::{ItemSource, NoItems, RequestContext, StaticItems};
pub use dispatcher::{build_store, Dispatcher};
pub use error::{ConfigError, FilterError, ItemError, ResolveError};
pub use phase::{Phase, ResultCode};
pub use resolve::{Resolver, StaticResolver, SystemResolver};

pub use netfilter_rules::{Effect, Verdict};

/// Core result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests;
