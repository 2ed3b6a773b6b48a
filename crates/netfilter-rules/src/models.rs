//! # Core Types for the Match Engine
//!
//! [`Effect`] is what a rule asserts, [`Verdict`] is what a scan concludes.
//! A rule can only allow or deny; a scan may also end without an answer.

use serde::{Deserialize, Serialize};

use crate::pattern::Pattern;

/// What a matching rule asserts about the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// The candidate may proceed.
    Allow,
    /// The candidate is refused.
    #[default]
    Deny,
}

impl Effect {
    /// The opposite effect, used by negated rules.
    pub fn inverted(self) -> Self {
        match self {
            Effect::Allow => Effect::Deny,
            Effect::Deny => Effect::Allow,
        }
    }

    /// Parse `allow` / `deny` (case-insensitive).
    pub fn from_keyword(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("allow") {
            Some(Effect::Allow)
        } else if value.eq_ignore_ascii_case("deny") {
            Some(Effect::Deny)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

/// Tri-state outcome of evaluating a rule store.
///
/// - `Allow`: the first matching rule (or the default) allows
/// - `Deny`: the first matching rule (or the default) denies
/// - `Indeterminate`: no decision could be made, e.g. the candidate
///   attribute was unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Access permitted.
    Allow,
    /// Access refused.
    Deny,
    /// No decision possible.
    Indeterminate,
}

impl Verdict {
    /// Returns true if this is an Allow verdict.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    /// Returns true if this is a Deny verdict.
    #[inline]
    pub fn is_denied(&self) -> bool {
        matches!(self, Verdict::Deny)
    }

    /// Returns true if no decision was reached.
    #[inline]
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Verdict::Indeterminate)
    }
}

impl From<Effect> for Verdict {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Allow => Verdict::Allow,
            Effect::Deny => Verdict::Deny,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Deny => write!(f, "deny"),
            Verdict::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// One configured filter entry.
///
/// Created at load time and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct FilterRule {
    /// What the candidate is compared against.
    pub pattern: Pattern,
    /// Effect asserted when the rule applies.
    pub effect: Effect,
    /// `!pattern`: a match yields the inverted effect.
    pub negated: bool,
    /// 1-based line in the rule source (argument position for inline rules).
    pub line: usize,
}

impl FilterRule {
    /// Build a rule.
    pub fn new(pattern: Pattern, effect: Effect, negated: bool, line: usize) -> Self {
        Self {
            pattern,
            effect,
            negated,
            line,
        }
    }

    /// Effect this rule asserts for `candidate`, or `None` when the pattern
    /// does not match.
    pub fn apply(&self, candidate: &str) -> Option<Effect> {
        if !self.pattern.matches(candidate) {
            return None;
        }
        if self.negated {
            Some(self.effect.inverted())
        } else {
            Some(self.effect)
        }
    }
}

impl std::fmt::Display for FilterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = match self.effect {
            Effect::Allow => '+',
            Effect::Deny => '-',
        };
        let bang = if self.negated { "!" } else { "" };
        write!(f, "{} {}{}", marker, bang, self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_inverted() {
        assert_eq!(Effect::Allow.inverted(), Effect::Deny);
        assert_eq!(Effect::Deny.inverted(), Effect::Allow);
    }

    #[test]
    fn test_effect_default_is_deny() {
        assert_eq!(Effect::default(), Effect::Deny);
    }

    #[test]
    fn test_effect_from_keyword() {
        assert_eq!(Effect::from_keyword("ALLOW"), Some(Effect::Allow));
        assert_eq!(Effect::from_keyword("deny"), Some(Effect::Deny));
        assert_eq!(Effect::from_keyword("maybe"), None);
    }

    #[test]
    fn test_verdict_predicates() {
        assert!(Verdict::Allow.is_allowed());
        assert!(Verdict::Deny.is_denied());
        assert!(Verdict::Indeterminate.is_indeterminate());
        assert!(!Verdict::Indeterminate.is_allowed());
    }

    #[test]
    fn test_negated_rule_inverts_on_match() {
        let rule = FilterRule::new(Pattern::parse("*.bad.example").unwrap(), Effect::Allow, true, 1);
        assert_eq!(rule.apply("x.bad.example"), Some(Effect::Deny));
        assert_eq!(rule.apply("x.good.example"), None);
    }

    #[test]
    fn test_rule_display() {
        let rule = FilterRule::new(Pattern::parse("10.0.0.0/8").unwrap(), Effect::Deny, true, 4);
        assert_eq!(rule.to_string(), "- !10.0.0.0/8");
    }

    #[test]
    fn test_verdict_serialization() {
        let json = serde_json::to_string(&Verdict::Indeterminate).unwrap();
        assert_eq!(json, "\"indeterminate\"");
    }
}
