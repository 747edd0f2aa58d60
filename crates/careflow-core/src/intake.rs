//! # Intake
//!
//! Admission of new patients. Creation never runs the transition engine;
//! a new patient simply starts in the state it was admitted to.

use crate::primitives::{MAX_FOLLOW_UP_ATTEMPTS_LENGTH, MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
use crate::rules::RuleTable;
use crate::store::PatientStore;
use crate::workflow::Workflow;
use crate::{CareflowError, NewPatient, Patient, ValidationErrors};

/// Validates and admits patients.
pub struct Intake;

impl Intake {
    /// Check a creation payload, collecting every field problem at once.
    pub fn validate(patient: &NewPatient, rules: &RuleTable) -> Result<(), CareflowError> {
        let mut errors = ValidationErrors::new();

        check_text(&mut errors, "name", &patient.name, MAX_NAME_LENGTH);
        check_text(
            &mut errors,
            "current_cohort",
            &patient.current.cohort,
            MAX_LABEL_LENGTH,
        );
        check_text(
            &mut errors,
            "current_sub_stage",
            &patient.current.sub_stage,
            MAX_LABEL_LENGTH,
        );
        check_text(
            &mut errors,
            "follow_up_attempts",
            &patient.attributes.follow_up_attempts,
            MAX_FOLLOW_UP_ATTEMPTS_LENGTH,
        );

        let labels_present =
            !patient.current.cohort.is_empty() && !patient.current.sub_stage.is_empty();
        if labels_present && !rules.contains_state(&patient.current) {
            errors.push(
                "current_sub_stage",
                format!("{} is not a state of the workflow", patient.current),
            );
        }

        errors.into_result()
    }

    /// Validate `patient` against the workflow, then persist it.
    pub fn admit<S: PatientStore>(
        store: &S,
        workflow: &Workflow,
        patient: NewPatient,
    ) -> Result<Patient, CareflowError> {
        Self::validate(&patient, workflow.rules())?;
        let admitted = store.insert_patient(patient)?;
        tracing::info!(patient = %admitted.id, state = %admitted.current, "patient admitted");
        Ok(admitted)
    }

    /// Validate every patient, then persist them all in one unit of work.
    ///
    /// One invalid entry rejects the batch. Errors are reported per entry as
    /// `[index].field`.
    pub fn admit_batch<S: PatientStore>(
        store: &S,
        workflow: &Workflow,
        patients: Vec<NewPatient>,
    ) -> Result<Vec<Patient>, CareflowError> {
        let mut errors = ValidationErrors::new();
        for (index, patient) in patients.iter().enumerate() {
            match Self::validate(patient, workflow.rules()) {
                Ok(()) => {}
                Err(CareflowError::Validation(entry)) => {
                    for e in entry.0 {
                        errors.push(format!("[{}].{}", index, e.field), e.message);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        errors.into_result()?;

        let admitted = store.insert_patients(patients)?;
        tracing::info!(count = admitted.len(), "patients admitted");
        Ok(admitted)
    }
}

fn check_text(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.push(field, "This field may not be blank.");
    } else if value.chars().count() > max {
        errors.push(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::StageKey;
    use crate::storage::RedbStore;
    use crate::store::PatientStore;

    fn workflow() -> Workflow {
        Workflow::builtin().unwrap()
    }

    #[test]
    fn accepts_source_state() {
        let patient = NewPatient::new("Ada", StageKey::new("New Recommendations", "A1"));
        assert!(Intake::validate(&patient, workflow().rules()).is_ok());
    }

    #[test]
    fn accepts_terminal_state() {
        let patient = NewPatient::new("Ada", StageKey::new("End", "Closed"));
        assert!(Intake::validate(&patient, workflow().rules()).is_ok());
    }

    #[test]
    fn collects_every_field_error() {
        let mut patient = NewPatient::new(" ", StageKey::new("", "A1"));
        patient.attributes.follow_up_attempts = String::new();

        let err = Intake::validate(&patient, workflow().rules()).unwrap_err();
        let CareflowError::Validation(errors) = err else {
            panic!("expected validation error, got {:?}", err);
        };
        let fields: Vec<&str> = errors.fields().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "current_cohort", "follow_up_attempts"]);
    }

    #[test]
    fn rejects_long_name() {
        let patient = NewPatient::new(
            "x".repeat(MAX_NAME_LENGTH + 1),
            StageKey::new("New Recommendations", "A1"),
        );
        let err = Intake::validate(&patient, workflow().rules()).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn rejects_unknown_state() {
        let patient = NewPatient::new("Ada", StageKey::new("new recommendations", "A1"));
        let err = Intake::validate(&patient, workflow().rules()).unwrap_err();
        let CareflowError::Validation(errors) = err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(errors.fields()[0].field, "current_sub_stage");
    }

    #[test]
    fn admit_persists_without_transition() {
        let store = RedbStore::in_memory().unwrap();
        let mut new = NewPatient::new("Ada", StageKey::new("Ready to Schedule", "A4"));
        // Would match immediately if creation ran the engine.
        new.attributes.scheduled_admission = true;

        let patient = Intake::admit(&store, &workflow(), new).unwrap();

        let stored = store.patient(patient.id).unwrap().unwrap();
        assert_eq!(stored.current, StageKey::new("Ready to Schedule", "A4"));
        assert!(stored.previous.is_none());
        assert!(store.history(patient.id).unwrap().is_empty());
        assert!(store.stage_record(patient.id).unwrap().is_none());
    }

    #[test]
    fn admit_rejects_before_writing() {
        let store = RedbStore::in_memory().unwrap();
        let new = NewPatient::new("", StageKey::new("Nowhere", "Z9"));

        assert!(Intake::admit(&store, &workflow(), new).is_err());
        assert!(store.patient_ids().unwrap().is_empty());
    }

    #[test]
    fn batch_is_rejected_as_a_whole() {
        let store = RedbStore::in_memory().unwrap();
        let batch = vec![
            NewPatient::new("Ada", StageKey::new("New Recommendations", "A1")),
            NewPatient::new("", StageKey::new("Ready to Schedule", "A4")),
        ];

        let err = Intake::admit_batch(&store, &workflow(), batch).unwrap_err();

        let CareflowError::Validation(errors) = err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(errors.fields()[0].field, "[1].name");
        assert!(store.patient_ids().unwrap().is_empty());
    }

    #[test]
    fn batch_admits_every_patient() {
        let store = RedbStore::in_memory().unwrap();
        let batch = vec![
            NewPatient::new("Ada", StageKey::new("New Recommendations", "A1")),
            NewPatient::new("Grace", StageKey::new("Ready to Schedule", "A4")),
        ];

        let admitted = Intake::admit_batch(&store, &workflow(), batch).unwrap();

        assert_eq!(admitted.len(), 2);
        assert_eq!(store.patient_ids().unwrap().len(), 2);
        assert_eq!(admitted[1].current, StageKey::new("Ready to Schedule", "A4"));
    }
}
