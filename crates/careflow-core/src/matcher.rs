//! # Rule Matcher
//!
//! Finds the rule that applies to a patient's current state.
//!
//! Rules are scanned in table order. A rule applies when its source equals
//! the current state exactly and every condition holds. The first such rule
//! wins; later rules are never consulted.

use crate::StageKey;
use crate::attribute::Snapshot;
use crate::condition::evaluate;
use crate::rules::{RuleTable, TransitionRule};

/// Stateless rule matcher.
pub struct RuleMatcher;

impl RuleMatcher {
    /// First rule from `state` whose conditions all hold for `snapshot`.
    pub fn find_match<'t, S: Snapshot + ?Sized>(
        state: &StageKey,
        snapshot: &S,
        table: &'t RuleTable,
    ) -> Option<&'t TransitionRule> {
        table
            .rules_from(state)
            .find(|rule| Self::satisfied(snapshot, rule))
    }

    /// Whether every action, then every disposition, holds. Stops at the first failure.
    pub fn satisfied<S: Snapshot + ?Sized>(snapshot: &S, rule: &TransitionRule) -> bool {
        let passed = rule.conditions().all(|condition| evaluate(snapshot, condition));
        tracing::trace!(
            source = %rule.source,
            next = %rule.next,
            passed,
            "rule evaluated"
        );
        passed
    }
}
