//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Field names follow the flat patient record used by the pipeline's
//! clients (`current_cohort`, `current_sub_stage`, ...), not the nested
//! core types.

use careflow_core::{
    AdmissionStatus, CareflowError, FieldError, NewPatient, Patient, PatientAttributes,
    PatientId, StageKey, StageRecord, Transition, TransitionHistory, ValidationErrors,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// PATIENT PAYLOAD
// =============================================================================

/// Patient creation payload.
///
/// Kept as raw JSON so each field is checked on its own and every problem
/// is reported against the field that caused it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientPayload(pub Value);

impl PatientPayload {
    /// Convert to a `NewPatient`, validating field types.
    ///
    /// Required: `name`, `current_cohort`, `current_sub_stage`.
    /// Every attribute is optional and falls back to its default.
    /// Unrecognized fields are ignored.
    pub fn to_new_patient(&self) -> Result<NewPatient, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let Some(object) = self.0.as_object() else {
            errors.push(
                "non_field_errors",
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    json_kind(&self.0)
                ),
            );
            return Err(errors);
        };

        let mut reader = FieldReader {
            object,
            errors: &mut errors,
        };

        let name = reader.required_text("name");
        let cohort = reader.required_text("current_cohort");
        let sub_stage = reader.required_text("current_sub_stage");

        let defaults = PatientAttributes::default();
        let attributes = PatientAttributes {
            days_since_follow_up: reader.int("days_since_follow_up", defaults.days_since_follow_up),
            days_since_last_contact: reader
                .int("days_since_last_contact", defaults.days_since_last_contact),
            days_until_admission: reader.int("days_until_admission", defaults.days_until_admission),
            clinical_intervention_required: reader.flag(
                "clinical_intervention_required",
                defaults.clinical_intervention_required,
            ),
            quotation_phase_required: reader
                .flag("quotation_phase_required", defaults.quotation_phase_required),
            patient_ready: reader.flag("patient_ready", defaults.patient_ready),
            clinical_intervention_completed: reader.flag(
                "clinical_intervention_completed",
                defaults.clinical_intervention_completed,
            ),
            quotation_accepted: reader.flag("quotation_accepted", defaults.quotation_accepted),
            scheduled_admission: reader.flag("scheduled_admission", defaults.scheduled_admission),
            scheduled_date_in_past: reader
                .flag("scheduled_date_in_past", defaults.scheduled_date_in_past),
            admission_completed: reader.flag("admission_completed", defaults.admission_completed),
            admission_status: reader.status("admission_status", defaults.admission_status),
            lead_management_ends: reader
                .flag("lead_management_ends", defaults.lead_management_ends),
            final_response_received: reader
                .flag("final_response_received", defaults.final_response_received),
            follow_up_attempts: reader
                .text("follow_up_attempts")
                .unwrap_or(defaults.follow_up_attempts),
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        match (name, cohort, sub_stage) {
            (Some(name), Some(cohort), Some(sub_stage)) => {
                Ok(NewPatient::new(name, StageKey::new(cohort, sub_stage)).with_attributes(attributes))
            }
            // Missing required fields were recorded above.
            _ => Err(errors),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Form-style boolean spellings. Matching is exact: `yes`, `Yes` and `YES`
/// are accepted, `yEs` is not.
fn boolean_literal(s: &str) -> Option<bool> {
    match s {
        "t" | "T" | "y" | "Y" | "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on"
        | "On" | "ON" | "1" => Some(true),
        "f" | "F" | "n" | "N" | "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off"
        | "Off" | "OFF" | "0" => Some(false),
        _ => None,
    }
}

/// Typed access to a JSON object, recording one error per bad field.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    errors: &'a mut ValidationErrors,
}

impl<'a> FieldReader<'a> {
    fn present(&self, field: &str) -> Option<&'a Value> {
        self.object.get(field).filter(|v| !v.is_null())
    }

    fn required_text(&mut self, field: &str) -> Option<String> {
        if self.present(field).is_none() {
            self.errors.push(field, "This field is required.");
            return None;
        }
        self.text(field)
    }

    fn text(&mut self, field: &str) -> Option<String> {
        match self.present(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.errors.push(field, "Not a valid string.");
                None
            }
        }
    }

    fn int(&mut self, field: &str, default: i64) -> i64 {
        let parsed = match self.present(field) {
            None => return default,
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(_) => None,
        };
        parsed.unwrap_or_else(|| {
            self.errors.push(field, "A valid integer is required.");
            default
        })
    }

    fn flag(&mut self, field: &str, default: bool) -> bool {
        let parsed = match self.present(field) {
            None => return default,
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::Number(n)) => match n.as_u64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Some(Value::String(s)) => boolean_literal(s),
            Some(_) => None,
        };
        parsed.unwrap_or_else(|| {
            self.errors.push(field, "Must be a valid boolean.");
            default
        })
    }

    fn status(&mut self, field: &str, default: AdmissionStatus) -> AdmissionStatus {
        let Some(value) = self.present(field) else {
            return default;
        };
        let parsed = value.as_str().and_then(|s| s.parse::<AdmissionStatus>().ok());
        parsed.unwrap_or_else(|| {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.errors
                .push(field, format!("\"{}\" is not a valid choice.", shown));
            default
        })
    }
}

// =============================================================================
// ADMIT RESPONSE
// =============================================================================

/// Patient creation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmitResponse {
    pub success: bool,
    pub message: Option<String>,
    pub patient_id: Option<u64>,
    pub errors: Vec<FieldError>,
}

impl AdmitResponse {
    pub fn success(patient: &Patient) -> Self {
        Self {
            success: true,
            message: Some("Patient admitted successfully".to_string()),
            patient_id: Some(patient.id.0),
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: ValidationErrors) -> Self {
        Self {
            success: false,
            message: Some("Validation failed".to_string()),
            patient_id: None,
            errors: errors.0,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(msg.into()),
            patient_id: None,
            errors: Vec::new(),
        }
    }
}

// =============================================================================
// PATIENT RESPONSE
// =============================================================================

/// A patient as exposed over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientJson {
    pub id: u64,
    pub name: String,
    pub current_cohort: String,
    pub current_sub_stage: String,
    pub previous_cohort: Option<String>,
    pub previous_sub_stage: Option<String>,
    #[serde(flatten)]
    pub attributes: PatientAttributes,
}

impl From<&Patient> for PatientJson {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id.0,
            name: patient.name.clone(),
            current_cohort: patient.current.cohort.clone(),
            current_sub_stage: patient.current.sub_stage.clone(),
            previous_cohort: patient.previous.as_ref().map(|p| p.cohort.clone()),
            previous_sub_stage: patient.previous.as_ref().map(|p| p.sub_stage.clone()),
            attributes: patient.attributes.clone(),
        }
    }
}

/// Single patient read-back, with its current stage record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientResponse {
    pub success: bool,
    pub patient: Option<PatientJson>,
    pub stage: Option<StageRecord>,
    pub error: Option<String>,
}

impl PatientResponse {
    pub fn success(patient: &Patient, stage: Option<StageRecord>) -> Self {
        Self {
            success: true,
            patient: Some(PatientJson::from(patient)),
            stage,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            patient: None,
            stage: None,
            error: Some(msg.into()),
        }
    }
}

/// Stored patient ids, ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientListResponse {
    pub success: bool,
    pub patient_ids: Vec<u64>,
    pub error: Option<String>,
}

impl PatientListResponse {
    pub fn success(ids: &[PatientId]) -> Self {
        Self {
            success: true,
            patient_ids: ids.iter().map(|id| id.0).collect(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            patient_ids: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

/// Patient deletion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl DeleteResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            message: Some("Patient deleted successfully".to_string()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// TRANSITION RESPONSE
// =============================================================================

/// Transition trigger response.
///
/// `applied` tells "a rule matched and was committed" apart from
/// "nothing happened"; `retryable` is set only on storage failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub applied: bool,
    pub message: Option<String>,
    pub patient_id: Option<u64>,
    pub cohort: Option<String>,
    pub sub_stage: Option<String>,
    pub error: Option<String>,
    pub retryable: bool,
}

impl TransitionResponse {
    pub fn applied(patient_id: u64, transition: &Transition) -> Self {
        Self {
            success: true,
            applied: true,
            message: Some("Patient transitioned successfully".to_string()),
            patient_id: Some(patient_id),
            cohort: Some(transition.next.cohort.clone()),
            sub_stage: Some(transition.next.sub_stage.clone()),
            error: None,
            retryable: false,
        }
    }

    /// No rule applies. Reports the unchanged state.
    pub fn no_match(patient_id: u64, state: &StageKey) -> Self {
        Self {
            success: false,
            applied: false,
            message: Some("No transition applied".to_string()),
            patient_id: Some(patient_id),
            cohort: Some(state.cohort.clone()),
            sub_stage: Some(state.sub_stage.clone()),
            error: None,
            retryable: false,
        }
    }

    pub fn failed(error: &CareflowError) -> Self {
        Self {
            success: false,
            applied: false,
            message: None,
            patient_id: None,
            cohort: None,
            sub_stage: None,
            error: Some(error.to_string()),
            retryable: error.is_retryable(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            applied: false,
            message: None,
            patient_id: None,
            cohort: None,
            sub_stage: None,
            error: Some(msg.into()),
            retryable: false,
        }
    }
}

// =============================================================================
// HISTORY RESPONSE
// =============================================================================

/// One history record as exposed over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub patient: u64,
    pub previous_cohort: String,
    pub previous_sub_stage: String,
    pub next_cohort: String,
    pub next_sub_stage: String,
    pub transition_date: DateTime<Utc>,
}

impl From<&TransitionHistory> for HistoryEntry {
    fn from(record: &TransitionHistory) -> Self {
        Self {
            id: record.id.0,
            patient: record.patient.0,
            previous_cohort: record.previous.cohort.clone(),
            previous_sub_stage: record.previous.sub_stage.clone(),
            next_cohort: record.next.cohort.clone(),
            next_sub_stage: record.next.sub_stage.clone(),
            transition_date: record.transitioned_at,
        }
    }
}

/// Patient history response, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub patient_id: Option<u64>,
    pub history: Vec<HistoryEntry>,
    pub error: Option<String>,
}

impl HistoryResponse {
    pub fn success(patient_id: u64, history: &[TransitionHistory]) -> Self {
        Self {
            success: true,
            patient_id: Some(patient_id),
            history: history.iter().map(HistoryEntry::from).collect(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            patient_id: None,
            history: Vec::new(),
            error: Some(msg.into()),
        }
    }
}
