//! # Transition Executor
//!
//! Applies the first matching rule to a patient as one unit of work.
//!
//! Inside a single store transaction:
//! 1. Load the patient
//! 2. Find the first satisfied rule for its current state
//! 3. Resolve the stage kind of the target cohort
//! 4. Move the patient, append history, replace the stage record
//! 5. Commit
//!
//! Any early return drops the transaction, so nothing is written unless
//! every step succeeded. The stage kind is resolved before the first write;
//! a registry gap therefore never leaves a half-applied transition.

use crate::matcher::RuleMatcher;
use crate::stage::StageRecord;
use crate::store::{PatientStore, StoreTransaction};
use crate::workflow::Workflow;
use crate::{CareflowError, PatientId, StageKey, TransitionHistory};
use chrono::Utc;

// =============================================================================
// OUTCOME
// =============================================================================

/// A committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub previous: StageKey,
    /// The patient's new state.
    pub next: StageKey,
    pub history: TransitionHistory,
    pub stage: StageRecord,
}

/// Result of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// No patient with this identity.
    NotFound(PatientId),
    /// No rule applies from this state. Nothing was written.
    NoMatch(StageKey),
    Applied(Transition),
    /// The unit of work was rolled back.
    Failed(CareflowError),
}

impl TransitionOutcome {
    /// Map onto the error taxonomy. Only `Applied` is `Ok`.
    pub fn into_result(self) -> Result<Transition, CareflowError> {
        match self {
            Self::Applied(transition) => Ok(transition),
            Self::NotFound(id) => Err(CareflowError::NotFound(id)),
            Self::NoMatch(state) => Err(CareflowError::NoTransition(state)),
            Self::Failed(error) => Err(error),
        }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Runs transitions against a store under a fixed workflow.
pub struct TransitionExecutor<'a, S: PatientStore> {
    store: &'a S,
    workflow: &'a Workflow,
}

impl<'a, S: PatientStore> TransitionExecutor<'a, S> {
    pub fn new(store: &'a S, workflow: &'a Workflow) -> Self {
        Self { store, workflow }
    }

    /// Advance patient `id` by at most one step.
    pub fn execute(&self, id: PatientId) -> TransitionOutcome {
        match self.apply(id) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(
                    patient = %id,
                    error = %error,
                    retryable = error.is_retryable(),
                    "transition failed; rolled back"
                );
                TransitionOutcome::Failed(error)
            }
        }
    }

    fn apply(&self, id: PatientId) -> Result<TransitionOutcome, CareflowError> {
        let mut txn = self.store.begin()?;

        let Some(mut patient) = txn.load_patient(id)? else {
            tracing::debug!(patient = %id, "transition requested for unknown patient");
            return Ok(TransitionOutcome::NotFound(id));
        };

        let Some(rule) = RuleMatcher::find_match(&patient.current, &patient, self.workflow.rules())
        else {
            tracing::debug!(patient = %id, state = %patient.current, "no transition applies");
            return Ok(TransitionOutcome::NoMatch(patient.current));
        };

        let kind = self.workflow.stages().require(&rule.next.cohort)?;
        let now = Utc::now();

        let previous = patient.advance(rule.next.clone());
        txn.save_patient(&patient)?;
        let history = txn.append_history(patient.id, &previous, &patient.current, now)?;
        let stage = self
            .workflow
            .stages()
            .replace(&mut txn, &patient, kind, now)?;
        txn.commit()?;

        tracing::info!(
            patient = %id,
            from = %previous,
            to = %patient.current,
            stage = %kind,
            "patient transitioned"
        );

        Ok(TransitionOutcome::Applied(Transition {
            previous,
            next: patient.current,
            history,
            stage,
        }))
    }
}
