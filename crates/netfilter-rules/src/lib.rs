//! # Netfilter Rules - Rule Store and Match Engine
//!
//! The decision core of the PAM network filter. A [`RuleStore`] holds the
//! configured filter entries in source order; the [`MatchEngine`] scans it
//! for a candidate value (a remote host, address, or user name) and produces
//! a tri-state [`Verdict`].
//!
//! ## Matching Model
//!
//! | Step | Behavior |
//! |------|----------|
//! | Candidate missing or empty | `Indeterminate`, no rule is consulted |
//! | Rule scan | In order; first matching rule wins and short-circuits |
//! | Negated rule (`!pattern`) | Yields the opposite of its effect when the pattern matches |
//! | No rule matched | The configured default effect (deny unless configured) |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        NETFILTER RULES                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   rule source ──▶ ┌──────────────┐      ┌──────────────────┐    │
//! │   (file/inline)   │  RULE STORE  │ ───▶ │   MATCH ENGINE   │    │
//! │                   │ ordered list │      │ first match wins │    │
//! │                   └──────────────┘      └────────┬─────────┘    │
//! │                                                  │              │
//! │                                                  ▼              │
//! │                                   Allow │ Deny │ Indeterminate  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use netfilter_rules::{Effect, MatchEngine, ParseOptions, RuleStore, Verdict};
//!
//! let store = RuleStore::parse(
//!     "- *.bad.example\n+ *.example\n",
//!     "inline",
//!     &ParseOptions::default(),
//! )?;
//! let engine = MatchEngine::new();
//!
//! assert_eq!(engine.evaluate(&store, Some("host.example")), Verdict::Allow);
//! assert_eq!(engine.evaluate(&store, Some("x.bad.example")), Verdict::Deny);
//! assert_eq!(engine.evaluate(&store, Some("other.org")), Verdict::Deny);
//! assert_eq!(engine.evaluate(&store, None), Verdict::Indeterminate);
//! # let _ = Effect::Allow;
//! # Ok::<(), netfilter_rules::RuleError>(())
//! ```
//!
//! ## Security Notes
//!
//! - The default effect is `Deny`; an empty store never grants access
//! - Rules are immutable once loaded
//! - Loading is a bounded synchronous read, see [`MAX_RULE_FILE_BYTES`]

pub mod engine;
pub mod error;
pub mod models;
pub mod pattern;
pub mod store;

pub use engine::{evaluate, Decision, EngineConfig, MatchEngine};
pub use error::{Result, RuleError};
pub use models::{Effect, FilterRule, Verdict};
pub use pattern::Pattern;
pub use store::{ParseOptions, RuleStore, MAX_RULE_FILE_BYTES, USER_NAME_SYNTAX};
