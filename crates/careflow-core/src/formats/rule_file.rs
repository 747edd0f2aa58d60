//! # Rule File Format
//!
//! The on-disk shape of a workflow: an ordered `state_transitions` list and a
//! `stages` table. The same document shape is accepted as TOML or JSON.
//!
//! ```toml
//! [[state_transitions]]
//! current_cohort = "Ready to Schedule"
//! current_sub_stage = "A4"
//! next_cohort = "B"
//! next_sub_cohort = "Pre-Admission Prep"
//!
//! [[state_transitions.conditions.dispositions]]
//! condition = "scheduled_admission"
//! value = true
//!
//! [stages]
//! "B" = "pre_admission_prep"
//! ```
//!
//! Loading only checks what evaluation needs: operators must be known.
//! Attribute names outside the closed set are accepted with a warning.

use crate::attribute::{AttributeRef, Value};
use crate::condition::{Condition, Operator};
use crate::rules::{RuleTable, TransitionRule};
use crate::stage::{StageKind, StageRegistry};
use crate::workflow::Workflow;
use crate::{CareflowError, StageKey, primitives};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The default workflow shipped with the binary.
pub const DEFAULT_RULES_TOML: &str = include_str!("default_rules.toml");

// =============================================================================
// DOCUMENT
// =============================================================================

/// A complete rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFile {
    pub state_transitions: Vec<RuleEntry>,
    #[serde(default)]
    pub stages: BTreeMap<String, StageKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub current_cohort: String,
    pub current_sub_stage: String,
    #[serde(default)]
    pub conditions: ConditionSet,
    pub next_cohort: String,
    pub next_sub_cohort: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ConditionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dispositions: Vec<ConditionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEntry {
    /// Attribute name.
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_condition: Option<Box<ConditionEntry>>,
}

// =============================================================================
// CONVERSION
// =============================================================================

impl RuleFile {
    /// Build the runtime workflow.
    ///
    /// Fails with [`CareflowError::Configuration`] on an unknown operator.
    pub fn into_workflow(self) -> Result<Workflow, CareflowError> {
        let mut unknown = BTreeSet::new();
        let mut rules = Vec::with_capacity(self.state_transitions.len());

        for (index, entry) in self.state_transitions.into_iter().enumerate() {
            let mut rule = TransitionRule::new(
                StageKey::new(entry.current_cohort, entry.current_sub_stage),
                StageKey::new(entry.next_cohort, entry.next_sub_cohort),
            );
            for action in entry.conditions.actions {
                rule = rule.with_action(action.into_condition(index, &mut unknown)?);
            }
            for disposition in entry.conditions.dispositions {
                rule = rule.with_disposition(disposition.into_condition(index, &mut unknown)?);
            }
            rules.push(rule);
        }

        for name in &unknown {
            tracing::warn!(
                attribute = %name,
                "rule references unknown attribute; its conditions never hold"
            );
        }

        let stages = self
            .stages
            .into_iter()
            .fold(StageRegistry::new(), |registry, (cohort, kind)| {
                registry.with(cohort, kind)
            });

        Ok(Workflow::new(RuleTable::new(rules), stages))
    }
}

impl ConditionEntry {
    fn into_condition(
        self,
        rule: usize,
        unknown: &mut BTreeSet<String>,
    ) -> Result<Condition, CareflowError> {
        let attribute = AttributeRef::resolve(&self.condition);
        if let AttributeRef::Unknown(name) = &attribute {
            unknown.insert(name.clone());
        }

        let operator = self
            .operator
            .as_deref()
            .map(str::parse::<Operator>)
            .transpose()
            .map_err(|e| {
                CareflowError::Configuration(format!(
                    "state_transitions[{}]: condition '{}': {}",
                    rule, self.condition, e
                ))
            })?;

        let sub_condition = match self.sub_condition {
            Some(sub) => Some(Box::new(sub.into_condition(rule, unknown)?)),
            None => None,
        };

        Ok(Condition {
            attribute,
            operator,
            value: self.value,
            sub_condition,
        })
    }

    fn from_condition(condition: &Condition) -> Self {
        Self {
            condition: condition.attribute.name().to_string(),
            operator: condition.operator.map(|op| op.symbol().to_string()),
            value: condition.value.clone(),
            sub_condition: condition
                .sub_condition
                .as_deref()
                .map(|sub| Box::new(Self::from_condition(sub))),
        }
    }
}

impl From<&Workflow> for RuleFile {
    fn from(workflow: &Workflow) -> Self {
        let state_transitions = workflow
            .rules()
            .rules()
            .iter()
            .map(|rule| RuleEntry {
                current_cohort: rule.source.cohort.clone(),
                current_sub_stage: rule.source.sub_stage.clone(),
                conditions: ConditionSet {
                    actions: rule.actions.iter().map(ConditionEntry::from_condition).collect(),
                    dispositions: rule
                        .dispositions
                        .iter()
                        .map(ConditionEntry::from_condition)
                        .collect(),
                },
                next_cohort: rule.next.cohort.clone(),
                next_sub_cohort: rule.next.sub_stage.clone(),
            })
            .collect();

        let stages = workflow
            .stages()
            .entries()
            .map(|(label, kind)| (label.to_string(), kind))
            .collect();

        Self {
            state_transitions,
            stages,
        }
    }
}

// =============================================================================
// PARSERS
// =============================================================================

fn check_size(text: &str) -> Result<(), CareflowError> {
    if text.len() > primitives::MAX_RULE_FILE_SIZE {
        return Err(CareflowError::Configuration(format!(
            "rule file too large: {} bytes (max: {} bytes)",
            text.len(),
            primitives::MAX_RULE_FILE_SIZE
        )));
    }
    Ok(())
}

/// Parse a TOML rule file into a workflow.
pub fn workflow_from_toml(text: &str) -> Result<Workflow, CareflowError> {
    check_size(text)?;
    let file: RuleFile = toml::from_str(text)
        .map_err(|e| CareflowError::Configuration(format!("invalid rule file: {}", e)))?;
    file.into_workflow()
}

/// Parse a JSON rule file into a workflow.
pub fn workflow_from_json(text: &str) -> Result<Workflow, CareflowError> {
    check_size(text)?;
    let file: RuleFile = serde_json::from_str(text)
        .map_err(|e| CareflowError::Configuration(format!("invalid rule file: {}", e)))?;
    file.into_workflow()
}

/// Render a workflow as pretty-printed JSON in the rule file shape.
pub fn workflow_to_json(workflow: &Workflow) -> Result<String, CareflowError> {
    serde_json::to_string_pretty(&RuleFile::from(workflow))
        .map_err(|e| CareflowError::Serialization(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::attribute::AttributeKey;

    #[test]
    fn default_rules_load() {
        let workflow = workflow_from_toml(DEFAULT_RULES_TOML).unwrap();
        let rules = workflow.rules().rules();
        assert_eq!(rules.len(), 10);

        let first = &rules[0];
        assert_eq!(first.source, StageKey::new("New Recommendations", "A1"));
        assert_eq!(first.next, StageKey::new("A", "Follow-up"));
        assert_eq!(
            first.actions,
            vec![Condition::compare(
                AttributeKey::DaysSinceFollowUp,
                Operator::Ge,
                1
            )]
        );
        assert_eq!(first.dispositions.len(), 3);

        let last = &rules[9];
        assert_eq!(last.source, StageKey::new("Final Transition", "E2"));
        assert_eq!(last.next, StageKey::new("End", "Closed"));
    }

    #[test]
    fn default_rules_keep_placeholders() {
        let workflow = workflow_from_toml(DEFAULT_RULES_TOML).unwrap();
        let a2 = &workflow.rules().rules()[1];
        assert_eq!(a2.actions[0].value, Value::Text("Y".to_string()));
        assert_eq!(a2.actions[0].operator, Some(Operator::Gt));
    }

    #[test]
    fn default_rules_sub_condition() {
        let workflow = workflow_from_toml(DEFAULT_RULES_TOML).unwrap();
        let c1 = &workflow.rules().rules()[6];
        assert_eq!(c1.source, StageKey::new("Postponed Admissions", "C1"));
        assert_eq!(
            c1.dispositions[0],
            Condition::equals(AttributeKey::ScheduledDateInPast, true)
                .with_sub_condition(Condition::equals(AttributeKey::AdmissionCompleted, false))
        );
    }

    #[test]
    fn default_stages_cover_every_target() {
        let workflow = workflow_from_toml(DEFAULT_RULES_TOML).unwrap();
        assert!(workflow.unmapped_cohorts().is_empty());
        assert_eq!(workflow.stages().stage_kind_for("A"), Some(StageKind::FollowUp));
        assert_eq!(workflow.stages().stage_kind_for("End"), Some(StageKind::Closed));
    }

    #[test]
    fn json_document_shape() {
        let json = r#"{
            "state_transitions": [{
                "current_sub_stage": "B2",
                "current_cohort": "Admission Soon",
                "conditions": {
                    "dispositions": [{"condition": "admission_status", "value": "Cancelled"}]
                },
                "next_cohort": "C",
                "next_sub_cohort": "Postponed Admissions"
            }],
            "stages": {"C": "postponed_admissions"}
        }"#;

        let workflow = workflow_from_json(json).unwrap();
        let rule = &workflow.rules().rules()[0];
        assert!(rule.actions.is_empty());
        assert_eq!(
            rule.dispositions,
            vec![Condition::equals(AttributeKey::AdmissionStatus, "Cancelled")]
        );
        assert_eq!(
            workflow.stages().stage_kind_for("C"),
            Some(StageKind::PostponedAdmissions)
        );
    }

    #[test]
    fn missing_conditions_means_unconditional() {
        let toml = r#"
            [[state_transitions]]
            current_cohort = "X"
            current_sub_stage = "X1"
            next_cohort = "Y"
            next_sub_cohort = "Y1"
        "#;
        let workflow = workflow_from_toml(toml).unwrap();
        assert_eq!(workflow.rules().rules()[0].conditions().count(), 0);
        assert!(workflow.stages().is_empty());
    }

    #[test]
    fn unknown_operator_is_configuration_error() {
        let toml = r#"
            [[state_transitions]]
            current_cohort = "X"
            current_sub_stage = "X1"
            next_cohort = "Y"
            next_sub_cohort = "Y1"

            [[state_transitions.conditions.actions]]
            condition = "days_since_follow_up"
            operator = "!="
            value = 1
        "#;
        let err = workflow_from_toml(toml).unwrap_err();
        let CareflowError::Configuration(message) = err else {
            panic!("expected configuration error, got {:?}", err);
        };
        assert!(message.contains("state_transitions[0]"));
        assert!(message.contains("!="));
    }

    #[test]
    fn unknown_attribute_loads() {
        let toml = r#"
            [[state_transitions]]
            current_cohort = "X"
            current_sub_stage = "X1"
            next_cohort = "Y"
            next_sub_cohort = "Y1"

            [[state_transitions.conditions.dispositions]]
            condition = "favourite_colour"
            value = "blue"
        "#;
        let workflow = workflow_from_toml(toml).unwrap();
        assert_eq!(
            workflow.rules().rules()[0].dispositions[0].attribute,
            AttributeRef::Unknown("favourite_colour".to_string())
        );
    }

    #[test]
    fn unknown_stage_kind_is_rejected() {
        let toml = r#"
            state_transitions = []

            [stages]
            "A" = "somewhere_else"
        "#;
        assert!(matches!(
            workflow_from_toml(toml),
            Err(CareflowError::Configuration(_))
        ));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let text = " ".repeat(primitives::MAX_RULE_FILE_SIZE + 1);
        assert!(matches!(
            workflow_from_json(&text),
            Err(CareflowError::Configuration(_))
        ));
    }

    #[test]
    fn json_export_reloads_identically() {
        let workflow = workflow_from_toml(DEFAULT_RULES_TOML).unwrap();
        let json = workflow_to_json(&workflow).unwrap();
        assert_eq!(workflow_from_json(&json).unwrap(), workflow);
    }
}
