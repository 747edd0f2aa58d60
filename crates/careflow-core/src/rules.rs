//! # Rule Table
//!
//! The ordered, read-only set of transition rules.
//!
//! A rule table is built once at startup (see `formats`) and shared by
//! reference. Declaration order is significant: the first satisfied rule
//! for a state wins.

use crate::StageKey;
use crate::condition::Condition;
use std::collections::BTreeSet;

/// One permitted move through the pipeline.
///
/// All `actions` and all `dispositions` must hold (logical AND).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRule {
    /// State the patient must currently be in.
    pub source: StageKey,
    /// Gating conditions, typically counter thresholds.
    pub actions: Vec<Condition>,
    /// Gating conditions, typically flag or status equality.
    pub dispositions: Vec<Condition>,
    /// State the patient moves to.
    pub next: StageKey,
}

impl TransitionRule {
    /// A rule with no conditions.
    #[must_use]
    pub fn new(source: StageKey, next: StageKey) -> Self {
        Self {
            source,
            actions: Vec::new(),
            dispositions: Vec::new(),
            next,
        }
    }

    #[must_use]
    pub fn with_action(mut self, condition: Condition) -> Self {
        self.actions.push(condition);
        self
    }

    #[must_use]
    pub fn with_disposition(mut self, condition: Condition) -> Self {
        self.dispositions.push(condition);
        self
    }

    /// Actions first, then dispositions, each in declaration order.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.actions.iter().chain(self.dispositions.iter())
    }
}

/// Immutable, ordered collection of transition rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<TransitionRule>,
}

impl RuleTable {
    #[must_use]
    pub fn new(rules: Vec<TransitionRule>) -> Self {
        Self { rules }
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose source is `state`, in declaration order.
    pub fn rules_from<'a, 's>(
        &'a self,
        state: &'s StageKey,
    ) -> impl Iterator<Item = &'a TransitionRule> + use<'a, 's> {
        self.rules.iter().filter(move |rule| &rule.source == state)
    }

    /// Whether `state` is a source of some rule or a terminal target.
    #[must_use]
    pub fn contains_state(&self, state: &StageKey) -> bool {
        self.rules
            .iter()
            .any(|rule| &rule.source == state || &rule.next == state)
    }

    /// Cohort labels that rules move patients into.
    #[must_use]
    pub fn target_cohorts(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|rule| rule.next.cohort.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeKey;

    fn table() -> RuleTable {
        RuleTable::new(vec![
            TransitionRule::new(StageKey::new("Initial Transition", "E1"), StageKey::new("E", "Move to previous"))
                .with_disposition(Condition::equals(AttributeKey::LeadManagementEnds, true)),
            TransitionRule::new(StageKey::new("Final Transition", "E2"), StageKey::new("End", "Closed"))
                .with_disposition(Condition::equals(AttributeKey::FinalResponseReceived, true)),
        ])
    }

    #[test]
    fn contains_sources_and_targets() {
        let table = table();
        assert!(table.contains_state(&StageKey::new("Initial Transition", "E1")));
        assert!(table.contains_state(&StageKey::new("End", "Closed")));
        assert!(!table.contains_state(&StageKey::new("End", "closed")));
        assert!(!table.contains_state(&StageKey::new("E", "E1")));
    }

    #[test]
    fn rules_from_filters_by_source() {
        let table = table();
        let state = StageKey::new("Final Transition", "E2");
        let found: Vec<_> = table.rules_from(&state).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].next, StageKey::new("End", "Closed"));
    }

    #[test]
    fn conditions_iterate_actions_first() {
        let rule = TransitionRule::new(StageKey::new("a", "1"), StageKey::new("b", "2"))
            .with_disposition(Condition::equals(AttributeKey::PatientReady, true))
            .with_action(Condition::equals(AttributeKey::DaysSinceFollowUp, 1_i64));
        let names: Vec<_> = rule.conditions().map(|c| c.attribute.name()).collect();
        assert_eq!(names, vec!["days_since_follow_up", "patient_ready"]);
    }

    #[test]
    fn target_cohorts_are_deduplicated() {
        assert_eq!(
            table().target_cohorts().into_iter().collect::<Vec<_>>(),
            vec!["E", "End"]
        );
    }
}
