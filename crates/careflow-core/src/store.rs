//! # Repository Boundary
//!
//! The storage interface the transition engine is written against.
//!
//! ## Consistency model
//!
//! - A [`StoreTransaction`] is an exclusive unit of work. Only one may be open
//!   at a time, so two transitions of the same patient are serialized.
//! - Reads outside a transaction see committed state only: either everything
//!   a transaction wrote, or none of it.
//! - Dropping a transaction without calling [`commit`](StoreTransaction::commit)
//!   rolls it back.

use crate::stage::StageRecord;
use crate::{CareflowError, NewPatient, Patient, PatientId, StageKey, TransitionHistory};
use chrono::{DateTime, Utc};

/// Write operations available inside one unit of work.
pub trait StoreTransaction {
    /// Read a patient as seen by this transaction.
    fn load_patient(&mut self, id: PatientId) -> Result<Option<Patient>, CareflowError>;

    /// Overwrite a stored patient.
    fn save_patient(&mut self, patient: &Patient) -> Result<(), CareflowError>;

    /// Append one history record and return it.
    fn append_history(
        &mut self,
        patient: PatientId,
        previous: &StageKey,
        next: &StageKey,
        at: DateTime<Utc>,
    ) -> Result<TransitionHistory, CareflowError>;

    /// Empty the patient's stage slot, returning what was there.
    fn clear_stage_record(
        &mut self,
        patient: PatientId,
    ) -> Result<Option<StageRecord>, CareflowError>;

    /// Fill the patient's stage slot.
    fn put_stage_record(&mut self, record: &StageRecord) -> Result<(), CareflowError>;

    /// Make every write of this transaction visible, atomically.
    fn commit(self) -> Result<(), CareflowError>
    where
        Self: Sized;
}

/// A transactional patient repository.
pub trait PatientStore {
    type Transaction<'a>: StoreTransaction
    where
        Self: 'a;

    /// Open an exclusive unit of work. Blocks while another one is open.
    fn begin(&self) -> Result<Self::Transaction<'_>, CareflowError>;

    /// Persist new patients in one unit of work, assigning identities in order.
    ///
    /// Either every patient is stored or none is.
    fn insert_patients(&self, patients: Vec<NewPatient>) -> Result<Vec<Patient>, CareflowError>;

    /// Persist a new patient and assign its identity.
    fn insert_patient(&self, patient: NewPatient) -> Result<Patient, CareflowError> {
        self.insert_patients(vec![patient])?
            .pop()
            .ok_or_else(|| CareflowError::Persistence("insert stored no patient".to_string()))
    }

    fn patient(&self, id: PatientId) -> Result<Option<Patient>, CareflowError>;

    /// History of `id` in creation order. Empty if the patient has none.
    fn history(&self, id: PatientId) -> Result<Vec<TransitionHistory>, CareflowError>;

    /// History of `id`, or `None` if the patient does not exist.
    ///
    /// Existence and history come from one consistent snapshot.
    fn patient_history(
        &self,
        id: PatientId,
    ) -> Result<Option<Vec<TransitionHistory>>, CareflowError>;

    fn stage_record(&self, id: PatientId) -> Result<Option<StageRecord>, CareflowError>;

    /// A patient and its stage record, read from one consistent snapshot.
    fn patient_with_stage(
        &self,
        id: PatientId,
    ) -> Result<Option<(Patient, Option<StageRecord>)>, CareflowError>;

    /// Remove a patient together with its history and stage record.
    ///
    /// Returns `false` if no such patient exists.
    fn delete_patient(&self, id: PatientId) -> Result<bool, CareflowError>;

    /// All patient identities, ascending.
    fn patient_ids(&self) -> Result<Vec<PatientId>, CareflowError>;
}
