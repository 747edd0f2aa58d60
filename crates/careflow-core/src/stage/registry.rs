//! Cohort label to stage kind mapping.

use super::record::{StageKind, StageRecord};
use crate::store::StoreTransaction;
use crate::{CareflowError, Patient, PatientId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Maps cohort labels to the stage kind materialized on entry.
///
/// Lookup is exact and case-sensitive on the cohort label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageRegistry {
    kinds: BTreeMap<String, StageKind>,
}

impl StageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the kind for `cohort`.
    #[must_use]
    pub fn with(mut self, cohort: impl Into<String>, kind: StageKind) -> Self {
        self.kinds.insert(cohort.into(), kind);
        self
    }

    pub fn stage_kind_for(&self, cohort: &str) -> Option<StageKind> {
        self.kinds.get(cohort).copied()
    }

    /// Like [`stage_kind_for`](Self::stage_kind_for), with a configuration error for unknown labels.
    pub fn require(&self, cohort: &str) -> Result<StageKind, CareflowError> {
        self.stage_kind_for(cohort).ok_or_else(|| {
            CareflowError::Configuration(format!("unknown stage for cohort {}", cohort))
        })
    }

    /// Build the record for `patient` entering a stage of `kind`.
    #[must_use]
    pub fn create(&self, patient: &Patient, kind: StageKind, at: DateTime<Utc>) -> StageRecord {
        StageRecord {
            patient: patient.id,
            stage: patient.current.clone(),
            created_at: at,
            data: kind.materialize(patient),
        }
    }

    /// Remove whatever stage record `patient` holds.
    pub fn delete_all<T: StoreTransaction>(
        &self,
        txn: &mut T,
        patient: PatientId,
    ) -> Result<Option<StageRecord>, CareflowError> {
        txn.clear_stage_record(patient)
    }

    /// Delete the patient's record and store a fresh one of `kind`.
    pub fn replace<T: StoreTransaction>(
        &self,
        txn: &mut T,
        patient: &Patient,
        kind: StageKind,
        at: DateTime<Utc>,
    ) -> Result<StageRecord, CareflowError> {
        let removed = self.delete_all(txn, patient.id)?;
        if let Some(old) = removed {
            tracing::debug!(patient = %patient.id, kind = %old.kind(), "stage record removed");
        }
        let record = self.create(patient, kind, at);
        txn.put_stage_record(&record)?;
        Ok(record)
    }

    /// Registered (cohort, kind) pairs, ordered by label.
    pub fn entries(&self) -> impl Iterator<Item = (&str, StageKind)> {
        self.kinds.iter().map(|(label, kind)| (label.as_str(), *kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
