//! The phase dispatcher.
//!
//! This module is the single path from an entry-point call to a result
//! code. The [`Dispatcher`] parses module arguments, builds the rule store,
//! extracts the candidate attribute, and asks the match engine for a
//! verdict.

use std::net::IpAddr;

use netfilter_rules::{EngineConfig, MatchEngine, RuleStore, Verdict};
use tracing::{debug, info, warn};

use crate::config::{Item, ModuleArgs, OnErr, RuleSource};
use crate::context::{ItemSource, RequestContext};
use crate::error::FilterError;
use crate::phase::ResultCode;
use crate::resolve::{Resolver, SystemResolver};
use crate::Result;

/// Maps each lifecycle phase to a result code.
///
/// # Security Model
///
/// Every failure on the way to a verdict (bad arguments, unreadable rule
/// file, host item errors, failed name lookups) becomes
/// [`Verdict::Indeterminate`], which is resolved through `onerr`. With no
/// `onerr` argument that is [`ResultCode::PermissionDenied`].
///
/// The dispatcher keeps no state between calls.
///
/// # Example
///
/// ```rust
/// use netfilter_core::{Dispatcher, HostItem, Phase, RequestContext, ResultCode, StaticItems};
///
/// let args = vec!["allow=*.example".to_string()];
/// let items = StaticItems::new().with(HostItem::Rhost, "host.example");
/// let ctx = RequestContext::new(Phase::Authenticate, 0, &args, &items);
///
/// assert_eq!(Dispatcher::new().dispatch(&ctx), ResultCode::Success);
/// ```
pub struct Dispatcher {
    resolver: Box<dyn Resolver>,
}

impl Dispatcher {
    /// Create a dispatcher using the system resolver.
    pub fn new() -> Self {
        Self::with_resolver(SystemResolver)
    }

    /// Create a dispatcher with a custom resolver.
    pub fn with_resolver(resolver: impl Resolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
        }
    }

    /// Run one phase and produce the host result code.
    pub fn dispatch(&self, ctx: &RequestContext<'_>) -> ResultCode {
        if !ctx.phase.performs_matching() {
            debug!("feature '{}' not implemented", ctx.phase.symbol());
            return ResultCode::Ignore;
        }

        let (verdict, args) = match ModuleArgs::parse(ctx.args) {
            Ok(args) => (self.verdict_or_indeterminate(ctx, &args), Some(args)),
            Err(e) => {
                warn!("{}: {}", ctx.phase.symbol(), FilterError::from(e));
                (Verdict::Indeterminate, None)
            }
        };

        let onerr = args
            .as_ref()
            .map(|a| a.onerr)
            .unwrap_or_else(|| OnErr::scan(ctx.args));
        let code = ResultCode::for_verdict(verdict, onerr);

        match verdict {
            Verdict::Allow => {
                if !args.as_ref().is_some_and(|a| a.quiet) {
                    info!("{}: access granted", ctx.phase.symbol());
                }
            }
            Verdict::Deny => warn!("{}: access denied", ctx.phase.symbol()),
            Verdict::Indeterminate => {
                warn!(
                    "{}: no decision, onerr={:?} returns {}",
                    ctx.phase.symbol(),
                    onerr,
                    code
                )
            }
        }

        code
    }

    fn verdict_or_indeterminate(&self, ctx: &RequestContext<'_>, args: &ModuleArgs) -> Verdict {
        match self.evaluate(ctx.items, args) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("{}: {}", ctx.phase.symbol(), e);
                Verdict::Indeterminate
            }
        }
    }

    /// Evaluate the configured rules against the request.
    ///
    /// # Errors
    ///
    /// Rule loading and host item failures are returned as errors; an
    /// unresolvable candidate is not an error and yields
    /// [`Verdict::Indeterminate`].
    pub fn evaluate(&self, items: &dyn ItemSource, args: &ModuleArgs) -> Result<Verdict> {
        let store = build_store(args)?;
        let candidate = self.candidate(items, args.item)?;

        let engine = MatchEngine::with_config(EngineConfig {
            default_effect: args.default_effect,
        });
        let decision = engine.decide(&store, candidate.as_deref());

        debug!(
            "item {:?} = {:?}: {} (rule {:?} of {})",
            args.item,
            candidate,
            decision.verdict,
            decision.rule_index,
            store.len()
        );
        Ok(decision.verdict)
    }

    /// Extract the attribute named by `item`.
    ///
    /// `Ok(None)` when the host has no value or name resolution fails.
    pub fn candidate(&self, items: &dyn ItemSource, item: Item) -> Result<Option<String>> {
        let raw = match items.item(item.source())? {
            Some(value) if !value.is_empty() => value,
            _ => {
                debug!("item '{}' not set", item.source().name());
                return Ok(None);
            }
        };

        let value = match item {
            Item::RhostAddr => match raw.parse::<IpAddr>() {
                Ok(addr) => addr.to_string(),
                Err(_) => match self.resolver.forward(&raw) {
                    Ok(addr) => addr.to_string(),
                    Err(e) => {
                        warn!("{}", e);
                        return Ok(None);
                    }
                },
            },
            Item::RhostName => match raw.parse::<IpAddr>() {
                Ok(addr) => match self.resolver.reverse(addr) {
                    Ok(name) => name,
                    Err(e) => {
                        warn!("{}", e);
                        return Ok(None);
                    }
                },
                Err(_) => raw,
            },
            _ => raw,
        };

        if item.is_host_name() {
            Ok(Some(value.to_lowercase()))
        } else {
            Ok(Some(value))
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenate the configured rule sources in argument order.
pub fn build_store(args: &ModuleArgs) -> Result<RuleStore> {
    let options = args.parse_options();
    let mut store = RuleStore::new();

    for source in &args.sources {
        match source {
            RuleSource::File(path) => store.append_file(path, &options)?,
            RuleSource::Inline {
                effect,
                patterns,
                position,
            } => {
                for pattern in patterns {
                    store.append_pattern(pattern, *effect, *position, &options)?;
                }
            }
        }
    }

    if store.is_empty() {
        debug!("no rules configured, default {}", args.default_effect);
    }
    Ok(store)
}
