//! # Property-Based Tests
//!
//! Evaluator and matcher invariants checked with proptest.

use careflow_core::{
    AttributeKey, AttributeRef, Condition, NewPatient, Operator, PatientId, RuleMatcher,
    RuleTable, StageKey, TransitionRule, Value, evaluate,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;

// =============================================================================
// STRATEGIES
// =============================================================================

fn attribute_key() -> impl Strategy<Value = AttributeKey> {
    proptest::sample::select(AttributeKey::ALL.to_vec())
}

fn operator() -> impl Strategy<Value = Option<Operator>> {
    prop_oneof![
        Just(None),
        Just(Some(Operator::Ge)),
        Just(Some(Operator::Gt)),
        Just(Some(Operator::Le)),
        Just(Some(Operator::Lt)),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[A-Za-z0-9 -]{0,8}".prop_map(Value::Text),
    ]
}

fn condition() -> impl Strategy<Value = Condition> {
    let leaf = (attribute_key(), operator(), value()).prop_map(|(key, operator, value)| {
        Condition {
            attribute: AttributeRef::Known(key),
            operator,
            value,
            sub_condition: None,
        }
    });
    leaf.prop_recursive(3, 8, 1, |inner| {
        (attribute_key(), operator(), value(), inner).prop_map(|(key, operator, value, sub)| {
            Condition {
                attribute: AttributeRef::Known(key),
                operator,
                value,
                sub_condition: Some(Box::new(sub)),
            }
        })
    })
}

fn snapshot() -> impl Strategy<Value = BTreeMap<AttributeKey, Value>> {
    proptest::collection::btree_map(attribute_key(), value(), 0..15)
}

fn single(key: AttributeKey, current: Value) -> BTreeMap<AttributeKey, Value> {
    BTreeMap::from([(key, current)])
}

// =============================================================================
// EVALUATOR PROPERTIES
// =============================================================================

proptest! {
    /// Same snapshot and condition always produce the same answer.
    #[test]
    fn evaluation_is_deterministic(snap in snapshot(), cond in condition()) {
        prop_assert_eq!(evaluate(&snap, &cond), evaluate(&snap, &cond));
    }

    /// A snapshot without the attribute never satisfies a condition on it.
    #[test]
    fn missing_attribute_fails_closed(cond in condition()) {
        let empty: BTreeMap<AttributeKey, Value> = BTreeMap::new();
        prop_assert!(!evaluate(&empty, &cond));
    }

    /// Unknown attribute names never hold, whatever the snapshot holds.
    #[test]
    fn unknown_attribute_fails_closed(
        snap in snapshot(),
        op in operator(),
        literal in value(),
        name in "[a-z_]{1,20}"
    ) {
        prop_assume!(name.parse::<AttributeKey>().is_err());
        let cond = Condition {
            attribute: AttributeRef::Unknown(name),
            operator: op,
            value: literal,
            sub_condition: None,
        };
        prop_assert!(!evaluate(&snap, &cond));
    }

    /// Numeric text on the rule side compares like the integer it spells.
    #[test]
    fn numeric_text_is_coerced(current in -1000i64..1000, threshold in -1000i64..1000) {
        let snap = single(AttributeKey::DaysSinceFollowUp, Value::Int(current));
        for op in [Operator::Ge, Operator::Gt, Operator::Le, Operator::Lt] {
            let as_int = Condition::compare(AttributeKey::DaysSinceFollowUp, op, threshold);
            let as_text = Condition::compare(
                AttributeKey::DaysSinceFollowUp,
                op,
                Value::Text(format!(" {} ", threshold)),
            );
            prop_assert_eq!(evaluate(&snap, &as_int), evaluate(&snap, &as_text));
        }
    }

    /// Integer comparisons agree with the integer ordering.
    #[test]
    fn operators_follow_integer_order(current in any::<i64>(), threshold in any::<i64>()) {
        let snap = single(AttributeKey::DaysUntilAdmission, Value::Int(current));
        let check = |op| evaluate(&snap, &Condition::compare(AttributeKey::DaysUntilAdmission, op, threshold));

        prop_assert_eq!(check(Operator::Ge), current >= threshold);
        prop_assert_eq!(check(Operator::Gt), current > threshold);
        prop_assert_eq!(check(Operator::Le), current <= threshold);
        prop_assert_eq!(check(Operator::Lt), current < threshold);
        prop_assert_eq!(
            evaluate(&snap, &Condition::equals(AttributeKey::DaysUntilAdmission, threshold)),
            current == threshold
        );
    }

    /// Integers never order against non-numeric text.
    #[test]
    fn integer_against_placeholder_is_false(current in any::<i64>(), placeholder in "[A-Z]{1,3}") {
        let snap = single(AttributeKey::DaysSinceLastContact, Value::Int(current));
        for op in [Operator::Ge, Operator::Gt, Operator::Le, Operator::Lt] {
            let cond = Condition::compare(
                AttributeKey::DaysSinceLastContact,
                op,
                Value::Text(placeholder.clone()),
            );
            prop_assert!(!evaluate(&snap, &cond));
        }
    }

    /// A parent with a sub-condition holds exactly when both hold on their own.
    #[test]
    fn sub_condition_is_conjunction(snap in snapshot(), parent in condition(), sub in condition()) {
        let flat = Condition { sub_condition: None, ..parent };
        let nested = flat.clone().with_sub_condition(sub.clone());
        prop_assert_eq!(
            evaluate(&snap, &nested),
            evaluate(&snap, &flat) && evaluate(&snap, &sub)
        );
    }
}

// =============================================================================
// MATCHER PROPERTIES
// =============================================================================

proptest! {
    /// The match is the first rule, in table order, from the current state
    /// whose conditions all hold.
    #[test]
    fn first_satisfied_rule_wins(
        flags in vec(any::<bool>(), 1..12),
        sources in vec(0usize..3, 1..12),
    ) {
        let states = [
            StageKey::new("Ready to Schedule", "A4"),
            StageKey::new("Admission Soon", "B2"),
            StageKey::new("Clinical Stage", "C2"),
        ];
        let rules: Vec<TransitionRule> = flags
            .iter()
            .zip(sources.iter())
            .enumerate()
            .map(|(i, (&required, &source))| {
                TransitionRule::new(states[source].clone(), StageKey::new("T", format!("T{}", i)))
                    .with_disposition(Condition::equals(AttributeKey::ScheduledAdmission, required))
            })
            .collect();
        let table = RuleTable::new(rules.clone());

        let mut new = NewPatient::new("Ada", states[0].clone());
        new.attributes.scheduled_admission = true;
        let patient = new.into_patient(PatientId(1));

        let expected = rules
            .iter()
            .find(|rule| rule.source == patient.current && rule.dispositions[0].value == Value::Bool(true));

        prop_assert_eq!(RuleMatcher::find_match(&patient.current, &patient, &table), expected);
    }
}
