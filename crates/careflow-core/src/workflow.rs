//! # Workflow
//!
//! The read-only configuration a transition runs against: the rule table and
//! the stage registry. Built once at startup and shared by reference.

use crate::formats;
use crate::rules::RuleTable;
use crate::stage::StageRegistry;
use crate::CareflowError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workflow {
    rules: RuleTable,
    stages: StageRegistry,
}

impl Workflow {
    #[must_use]
    pub fn new(rules: RuleTable, stages: StageRegistry) -> Self {
        Self { rules, stages }
    }

    /// The workflow embedded in the binary.
    pub fn builtin() -> Result<Self, CareflowError> {
        formats::workflow_from_toml(formats::DEFAULT_RULES_TOML)
    }

    #[must_use]
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    #[must_use]
    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    /// Target cohorts with no registered stage kind.
    ///
    /// Transitions into these cohorts fail with a configuration error.
    #[must_use]
    pub fn unmapped_cohorts(&self) -> Vec<&str> {
        self.rules
            .target_cohorts()
            .into_iter()
            .filter(|cohort| self.stages.stage_kind_for(cohort).is_none())
            .collect()
    }
}
