//! Match engine
//!
//! Scans a [`RuleStore`] in order and stops at the first rule whose pattern
//! matches the candidate. Later rules are never consulted.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Effect, Verdict};
use crate::store::RuleStore;

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Verdict when no rule matches. Deny unless configured otherwise.
    pub default_effect: Effect,
}

/// Outcome of one scan, with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// The verdict.
    pub verdict: Verdict,
    /// Index into the store of the first matching rule, if any.
    pub rule_index: Option<usize>,
}

impl Decision {
    fn indeterminate() -> Self {
        Self {
            verdict: Verdict::Indeterminate,
            rule_index: None,
        }
    }
}

/// First-match-wins evaluator over a rule store.
///
/// The engine holds no state besides its configuration, so evaluating the
/// same store and candidate twice always yields the same verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine {
    config: EngineConfig,
}

impl MatchEngine {
    /// Create an engine with the deny-by-default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with a custom config.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate `candidate` against `store`.
    ///
    /// `None` or an empty string means the attribute could not be
    /// resolved and yields [`Verdict::Indeterminate`].
    pub fn evaluate(&self, store: &RuleStore, candidate: Option<&str>) -> Verdict {
        self.decide(store, candidate).verdict
    }

    /// Like [`evaluate`](Self::evaluate), also reporting which rule matched.
    pub fn decide(&self, store: &RuleStore, candidate: Option<&str>) -> Decision {
        let candidate = match candidate {
            Some(c) if !c.is_empty() => c,
            _ => {
                debug!("candidate unavailable, verdict indeterminate");
                return Decision::indeterminate();
            }
        };

        for (index, rule) in store.iter().enumerate() {
            if let Some(effect) = rule.apply(candidate) {
                debug!(
                    "'{}' matched rule {} (line {}): {}",
                    candidate, index, rule.line, effect
                );
                return Decision {
                    verdict: effect.into(),
                    rule_index: Some(index),
                };
            }
        }

        debug!(
            "'{}' matched none of {} rules, default {}",
            candidate,
            store.len(),
            self.config.default_effect
        );
        Decision {
            verdict: self.config.default_effect.into(),
            rule_index: None,
        }
    }
}

/// Evaluate with an explicit default effect.
pub fn evaluate(store: &RuleStore, candidate: Option<&str>, default_effect: Effect) -> Verdict {
    MatchEngine::with_config(EngineConfig { default_effect }).evaluate(store, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ParseOptions;

    fn store(text: &str) -> RuleStore {
        RuleStore::parse(text, "test", &ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let rules = store("- *.bad.example\n+ *.example\n");
        let engine = MatchEngine::new();

        assert_eq!(engine.evaluate(&rules, Some("host.example")), Verdict::Allow);
        assert_eq!(engine.evaluate(&rules, Some("x.bad.example")), Verdict::Deny);
    }

    #[test]
    fn test_later_opposite_rule_ignored() {
        let rules = store("+ alice\n- alice\n");
        let decision = MatchEngine::new().decide(&rules, Some("alice"));
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.rule_index, Some(0));
    }

    #[test]
    fn test_empty_store_denies_by_default() {
        let engine = MatchEngine::new();
        assert_eq!(engine.config().default_effect, Effect::Deny);
        assert_eq!(engine.evaluate(&RuleStore::new(), Some("host.example")), Verdict::Deny);
    }

    #[test]
    fn test_configured_default_allow() {
        let engine = MatchEngine::with_config(EngineConfig {
            default_effect: Effect::Allow,
        });
        let decision = engine.decide(&store("- 10.0.0.0/8"), Some("192.0.2.1"));
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.rule_index, None);
    }

    #[test]
    fn test_unresolved_candidate_is_indeterminate() {
        let rules = store("+ *");
        let engine = MatchEngine::new();
        assert_eq!(engine.evaluate(&rules, None), Verdict::Indeterminate);
        assert_eq!(engine.evaluate(&rules, Some("")), Verdict::Indeterminate);
        assert_eq!(engine.evaluate(&RuleStore::new(), None), Verdict::Indeterminate);
    }

    #[test]
    fn test_negated_rule() {
        let rules = store("+ !*.bad.example\n+ *");
        let engine = MatchEngine::new();
        assert_eq!(engine.evaluate(&rules, Some("x.bad.example")), Verdict::Deny);
        assert_eq!(engine.evaluate(&rules, Some("x.good.example")), Verdict::Allow);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let rules = store("- 10.0.0.5-10.0.0.9\n+ 10.0.0.0/8\n");
        let engine = MatchEngine::new();
        for candidate in ["10.0.0.7", "10.1.1.1", "192.0.2.1"] {
            let first = engine.evaluate(&rules, Some(candidate));
            let second = engine.evaluate(&rules, Some(candidate));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_free_function() {
        assert_eq!(evaluate(&RuleStore::new(), Some("a"), Effect::Allow), Verdict::Allow);
        assert_eq!(evaluate(&RuleStore::new(), Some("a"), Effect::Deny), Verdict::Deny);
    }
}
