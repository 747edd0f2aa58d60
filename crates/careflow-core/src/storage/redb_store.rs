//! # redb-backed Patient Store
//!
//! A disk-backed (or in-memory) patient repository using the redb embedded
//! database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! The single-writer property is what serializes concurrent transitions:
//! `begin()` waits until any other write transaction has committed or
//! been dropped.

use crate::stage::StageRecord;
use crate::store::{PatientStore, StoreTransaction};
use crate::{CareflowError, HistoryId, NewPatient, Patient, PatientId, StageKey, TransitionHistory};
use chrono::{DateTime, Utc};
use redb::backends::InMemoryBackend;
use redb::{
    Database, ReadOnlyTable, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for patients: PatientId(u64) -> serialized Patient bytes
const PATIENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("patients");

/// Table for history: (patient_id, history_id) -> serialized TransitionHistory bytes.
/// The composite key keeps one patient's records contiguous and in creation order.
const HISTORY: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("history");

/// Table for stage records: PatientId(u64) -> serialized StageRecord bytes.
/// One slot per patient.
const STAGE_RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("stage_records");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_PATIENT_ID: &str = "next_patient_id";
const NEXT_HISTORY_ID: &str = "next_history_id";

// =============================================================================
// ERROR HELPERS
// =============================================================================

fn storage_err(e: impl std::fmt::Display) -> CareflowError {
    CareflowError::Persistence(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CareflowError> {
    postcard::to_allocvec(value).map_err(|e| CareflowError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CareflowError> {
    postcard::from_bytes(bytes).map_err(|e| CareflowError::Serialization(e.to_string()))
}

/// Read and bump a metadata counter. Counters start at 1.
fn next_id(txn: &WriteTransaction, key: &str) -> Result<u64, CareflowError> {
    let mut meta = txn.open_table(METADATA).map_err(storage_err)?;
    let id = meta
        .get(key)
        .map_err(storage_err)?
        .map(|v| v.value())
        .unwrap_or(1);
    meta.insert(key, id.saturating_add(1)).map_err(storage_err)?;
    Ok(id)
}

// =============================================================================
// STORE
// =============================================================================

/// A patient repository backed by redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CareflowError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;
        Self::initialize(db)
    }

    /// A volatile database held entirely in memory.
    pub fn in_memory() -> Result<Self, CareflowError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(storage_err)?;
        Self::initialize(db)
    }

    /// Create the tables if they don't exist, so read transactions can open them.
    fn initialize(db: Database) -> Result<Self, CareflowError> {
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _ = write_txn.open_table(PATIENTS).map_err(storage_err)?;
            let _ = write_txn.open_table(HISTORY).map_err(storage_err)?;
            let _ = write_txn.open_table(STAGE_RECORDS).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(Self { db })
    }
}

impl PatientStore for RedbStore {
    type Transaction<'a> = RedbTransaction;

    fn begin(&self) -> Result<RedbTransaction, CareflowError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        Ok(RedbTransaction { txn })
    }

    fn insert_patients(&self, patients: Vec<NewPatient>) -> Result<Vec<Patient>, CareflowError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let mut inserted = Vec::with_capacity(patients.len());
        {
            let mut table = write_txn.open_table(PATIENTS).map_err(storage_err)?;
            for new in patients {
                let id = PatientId(next_id(&write_txn, NEXT_PATIENT_ID)?);
                let patient = new.into_patient(id);
                let bytes = encode(&patient)?;
                table.insert(id.0, bytes.as_slice()).map_err(storage_err)?;
                inserted.push(patient);
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(inserted)
    }

    fn patient(&self, id: PatientId) -> Result<Option<Patient>, CareflowError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(PATIENTS).map_err(storage_err)?;
        match table.get(id.0).map_err(storage_err)? {
            Some(bytes) => decode(bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    fn history(&self, id: PatientId) -> Result<Vec<TransitionHistory>, CareflowError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(HISTORY).map_err(storage_err)?;
        history_of(&table, id)
    }

    fn patient_history(
        &self,
        id: PatientId,
    ) -> Result<Option<Vec<TransitionHistory>>, CareflowError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let patients = read_txn.open_table(PATIENTS).map_err(storage_err)?;
        if patients.get(id.0).map_err(storage_err)?.is_none() {
            return Ok(None);
        }
        let table = read_txn.open_table(HISTORY).map_err(storage_err)?;
        history_of(&table, id).map(Some)
    }

    fn stage_record(&self, id: PatientId) -> Result<Option<StageRecord>, CareflowError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(STAGE_RECORDS).map_err(storage_err)?;
        match table.get(id.0).map_err(storage_err)? {
            Some(bytes) => decode(bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    fn patient_with_stage(
        &self,
        id: PatientId,
    ) -> Result<Option<(Patient, Option<StageRecord>)>, CareflowError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let patients = read_txn.open_table(PATIENTS).map_err(storage_err)?;
        let patient: Patient = match patients.get(id.0).map_err(storage_err)? {
            Some(bytes) => decode(bytes.value())?,
            None => return Ok(None),
        };

        let stages = read_txn.open_table(STAGE_RECORDS).map_err(storage_err)?;
        let stage = match stages.get(id.0).map_err(storage_err)? {
            Some(bytes) => Some(decode(bytes.value())?),
            None => None,
        };
        Ok(Some((patient, stage)))
    }

    fn delete_patient(&self, id: PatientId) -> Result<bool, CareflowError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut patients = write_txn.open_table(PATIENTS).map_err(storage_err)?;
            if patients.remove(id.0).map_err(storage_err)?.is_none() {
                return Ok(false);
            }

            let mut stages = write_txn.open_table(STAGE_RECORDS).map_err(storage_err)?;
            stages.remove(id.0).map_err(storage_err)?;

            let mut history = write_txn.open_table(HISTORY).map_err(storage_err)?;
            let mut keys = Vec::new();
            for entry in history
                .range((id.0, 0)..=(id.0, u64::MAX))
                .map_err(storage_err)?
            {
                let (key, _) = entry.map_err(storage_err)?;
                keys.push(key.value());
            }
            for key in keys {
                history.remove(key).map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(true)
    }

    fn patient_ids(&self) -> Result<Vec<PatientId>, CareflowError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(PATIENTS).map_err(storage_err)?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            ids.push(PatientId(key.value()));
        }
        Ok(ids)
    }
}

/// One patient's history rows, in key (creation) order.
fn history_of(
    table: &ReadOnlyTable<(u64, u64), &'static [u8]>,
    id: PatientId,
) -> Result<Vec<TransitionHistory>, CareflowError> {
    let mut history = Vec::new();
    for entry in table
        .range((id.0, 0)..=(id.0, u64::MAX))
        .map_err(storage_err)?
    {
        let (_, value) = entry.map_err(storage_err)?;
        history.push(decode(value.value())?);
    }
    Ok(history)
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// An open redb write transaction. Aborted on drop unless committed.
pub struct RedbTransaction {
    txn: WriteTransaction,
}

impl StoreTransaction for RedbTransaction {
    fn load_patient(&mut self, id: PatientId) -> Result<Option<Patient>, CareflowError> {
        let table = self.txn.open_table(PATIENTS).map_err(storage_err)?;
        let found = table.get(id.0).map_err(storage_err)?;
        match found {
            Some(bytes) => decode(bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    fn save_patient(&mut self, patient: &Patient) -> Result<(), CareflowError> {
        let bytes = encode(patient)?;
        let mut table = self.txn.open_table(PATIENTS).map_err(storage_err)?;
        table
            .insert(patient.id.0, bytes.as_slice())
            .map_err(storage_err)?;
        Ok(())
    }

    fn append_history(
        &mut self,
        patient: PatientId,
        previous: &StageKey,
        next: &StageKey,
        at: DateTime<Utc>,
    ) -> Result<TransitionHistory, CareflowError> {
        let id = HistoryId(next_id(&self.txn, NEXT_HISTORY_ID)?);
        let record = TransitionHistory {
            id,
            patient,
            previous: previous.clone(),
            next: next.clone(),
            transitioned_at: at,
        };
        let bytes = encode(&record)?;
        let mut table = self.txn.open_table(HISTORY).map_err(storage_err)?;
        table
            .insert((patient.0, id.0), bytes.as_slice())
            .map_err(storage_err)?;
        Ok(record)
    }

    fn clear_stage_record(
        &mut self,
        patient: PatientId,
    ) -> Result<Option<StageRecord>, CareflowError> {
        let mut table = self.txn.open_table(STAGE_RECORDS).map_err(storage_err)?;
        let removed = table.remove(patient.0).map_err(storage_err)?;
        match removed {
            Some(bytes) => decode(bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    fn put_stage_record(&mut self, record: &StageRecord) -> Result<(), CareflowError> {
        let bytes = encode(record)?;
        let mut table = self.txn.open_table(STAGE_RECORDS).map_err(storage_err)?;
        table
            .insert(record.patient.0, bytes.as_slice())
            .map_err(storage_err)?;
        Ok(())
    }

    fn commit(self) -> Result<(), CareflowError> {
        self.txn.commit().map_err(storage_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::stage::StageKind;
    use tempfile::tempdir;

    fn new_patient(name: &str) -> NewPatient {
        NewPatient::new(name, StageKey::new("New Recommendations", "A1"))
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let store = RedbStore::in_memory().expect("open db");

        let first = store.insert_patient(new_patient("Ada")).expect("insert");
        let second = store.insert_patient(new_patient("Grace")).expect("insert");

        assert_eq!(first.id, PatientId(1));
        assert_eq!(second.id, PatientId(2));
        assert_eq!(store.patient_ids().expect("ids"), vec![PatientId(1), PatientId(2)]);
    }

    #[test]
    fn persistence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        // Create and populate
        let id = {
            let store = RedbStore::open(&db_path).expect("open db");
            store.insert_patient(new_patient("Ada")).expect("insert").id
        };

        // Reopen and verify
        {
            let store = RedbStore::open(&db_path).expect("open db");
            let patient = store.patient(id).expect("get").expect("present");
            assert_eq!(patient.name, "Ada");
            // Counter survives reopen
            let next = store.insert_patient(new_patient("Grace")).expect("insert");
            assert_eq!(next.id, PatientId(2));
        }
    }

    #[test]
    fn committed_transaction_is_visible() {
        let store = RedbStore::in_memory().expect("open db");
        let mut patient = store.insert_patient(new_patient("Ada")).expect("insert");

        let mut txn = store.begin().expect("begin");
        let previous = patient.advance(StageKey::new("A", "Follow-up"));
        txn.save_patient(&patient).expect("save");
        txn.append_history(patient.id, &previous, &patient.current, Utc::now())
            .expect("history");
        txn.commit().expect("commit");

        let stored = store.patient(patient.id).expect("get").expect("present");
        assert_eq!(stored.current, StageKey::new("A", "Follow-up"));
        assert_eq!(store.history(patient.id).expect("history").len(), 1);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = RedbStore::in_memory().expect("open db");
        let mut patient = store.insert_patient(new_patient("Ada")).expect("insert");

        {
            let mut txn = store.begin().expect("begin");
            let previous = patient.advance(StageKey::new("A", "Follow-up"));
            txn.save_patient(&patient).expect("save");
            txn.append_history(patient.id, &previous, &patient.current, Utc::now())
                .expect("history");
        }

        let stored = store.patient(patient.id).expect("get").expect("present");
        assert_eq!(stored.current, StageKey::new("New Recommendations", "A1"));
        assert!(stored.previous.is_none());
        assert!(store.history(patient.id).expect("history").is_empty());
    }

    #[test]
    fn history_is_per_patient_and_ordered() {
        let store = RedbStore::in_memory().expect("open db");
        let a = store.insert_patient(new_patient("Ada")).expect("insert");
        let b = store.insert_patient(new_patient("Grace")).expect("insert");

        let steps = [("A", "Follow-up"), ("B", "Pre-Admission Prep"), ("C", "Postponed Admissions")];
        let mut txn = store.begin().expect("begin");
        let mut from = a.current.clone();
        for (cohort, sub) in steps {
            let to = StageKey::new(cohort, sub);
            txn.append_history(a.id, &from, &to, Utc::now()).expect("history");
            txn.append_history(b.id, &from, &to, Utc::now()).expect("history");
            from = to;
        }
        txn.commit().expect("commit");

        let history = store.history(a.id).expect("history");
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|h| h.patient == a.id));
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(history[0].next, StageKey::new("A", "Follow-up"));
        assert_eq!(history[2].next, StageKey::new("C", "Postponed Admissions"));
    }

    #[test]
    fn stage_slot_holds_one_record() {
        let store = RedbStore::in_memory().expect("open db");
        let patient = store.insert_patient(new_patient("Ada")).expect("insert");

        let record = |kind: StageKind| StageRecord {
            patient: patient.id,
            stage: patient.current.clone(),
            created_at: Utc::now(),
            data: kind.materialize(&patient),
        };

        let mut txn = store.begin().expect("begin");
        txn.put_stage_record(&record(StageKind::NewRecommendations)).expect("put");
        txn.put_stage_record(&record(StageKind::FollowUp)).expect("put");
        txn.commit().expect("commit");

        let stored = store.stage_record(patient.id).expect("get").expect("present");
        assert_eq!(stored.kind(), StageKind::FollowUp);

        let mut txn = store.begin().expect("begin");
        let cleared = txn.clear_stage_record(patient.id).expect("clear");
        assert_eq!(cleared.map(|r| r.kind()), Some(StageKind::FollowUp));
        assert!(txn.clear_stage_record(patient.id).expect("clear").is_none());
        txn.commit().expect("commit");

        assert!(store.stage_record(patient.id).expect("get").is_none());
    }

    #[test]
    fn patient_with_stage_reads_both() {
        let store = RedbStore::in_memory().expect("open db");
        let patient = store.insert_patient(new_patient("Ada")).expect("insert");
        assert_eq!(
            store.patient_with_stage(patient.id).expect("read"),
            Some((patient.clone(), None))
        );

        let record = StageRecord {
            patient: patient.id,
            stage: patient.current.clone(),
            created_at: Utc::now(),
            data: StageKind::NewRecommendations.materialize(&patient),
        };
        let mut txn = store.begin().expect("begin");
        txn.put_stage_record(&record).expect("put");
        txn.commit().expect("commit");

        assert_eq!(
            store.patient_with_stage(patient.id).expect("read"),
            Some((patient, Some(record)))
        );
        assert_eq!(store.patient_with_stage(PatientId(99)).expect("read"), None);
    }

    #[test]
    fn delete_cascades() {
        let store = RedbStore::in_memory().expect("open db");
        let keep = store.insert_patient(new_patient("Ada")).expect("insert");
        let gone = store.insert_patient(new_patient("Grace")).expect("insert");

        let mut txn = store.begin().expect("begin");
        for p in [&keep, &gone] {
            txn.append_history(p.id, &p.current, &StageKey::new("A", "Follow-up"), Utc::now())
                .expect("history");
            txn.put_stage_record(&StageRecord {
                patient: p.id,
                stage: StageKey::new("A", "Follow-up"),
                created_at: Utc::now(),
                data: StageKind::FollowUp.materialize(p),
            })
            .expect("put");
        }
        txn.commit().expect("commit");

        assert!(store.delete_patient(gone.id).expect("delete"));
        assert!(!store.delete_patient(gone.id).expect("delete twice"));

        assert!(store.patient(gone.id).expect("get").is_none());
        assert!(store.history(gone.id).expect("history").is_empty());
        assert!(store.stage_record(gone.id).expect("stage").is_none());

        assert_eq!(store.history(keep.id).expect("history").len(), 1);
        assert!(store.stage_record(keep.id).expect("stage").is_some());
    }

    #[test]
    fn batch_insert_assigns_ids_in_order() {
        let store = RedbStore::in_memory().expect("open db");
        let first = store.insert_patient(new_patient("Ada")).expect("insert");

        let batch = store
            .insert_patients(vec![new_patient("Grace"), new_patient("Lin")])
            .expect("batch");

        assert_eq!(first.id, PatientId(1));
        let ids: Vec<PatientId> = batch.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PatientId(2), PatientId(3)]);
        assert_eq!(batch[1].name, "Lin");
        assert_eq!(store.patient_ids().expect("ids").len(), 3);
        assert!(store.insert_patients(Vec::new()).expect("empty").is_empty());
    }

    #[test]
    fn patient_history_distinguishes_unknown_from_empty() {
        let store = RedbStore::in_memory().expect("open db");
        let patient = store.insert_patient(new_patient("Ada")).expect("insert");

        assert_eq!(store.patient_history(PatientId(99)).expect("read"), None);
        assert_eq!(store.patient_history(patient.id).expect("read"), Some(Vec::new()));

        let mut txn = store.begin().expect("begin");
        txn.append_history(patient.id, &patient.current, &StageKey::new("A", "Follow-up"), Utc::now())
            .expect("history");
        txn.commit().expect("commit");
        assert_eq!(
            store.patient_history(patient.id).expect("read").map(|h| h.len()),
            Some(1)
        );

        assert!(store.delete_patient(patient.id).expect("delete"));
        assert_eq!(store.patient_history(patient.id).expect("read"), None);
    }
}
