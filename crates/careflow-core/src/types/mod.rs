//! # Core Type Definitions
//!
//! This module contains the data model of the transition engine:
//! - Identifiers (`PatientId`, `HistoryId`)
//! - Pipeline position (`StageKey`)
//! - The tracked entity (`Patient`, `NewPatient`, `PatientAttributes`)
//! - The append-only transition log (`TransitionHistory`)
//! - Error types (`CareflowError`, `ValidationErrors`)
//!
//! ## Invariants
//!
//! - A patient sits in exactly one `StageKey` at a time.
//! - `previous` is only ever written by a committed transition.
//! - History records are created once and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a patient.
/// Assigned by the store on admission, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatientId(pub u64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a history record.
/// Monotonic across the whole store, so it doubles as creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistoryId(pub u64);

// =============================================================================
// STAGE KEY
// =============================================================================

/// A position in the care pipeline: the (cohort, sub-stage) pair.
///
/// Comparison is exact and case-sensitive on both labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageKey {
    /// Cohort label, e.g. "New Recommendations".
    pub cohort: String,
    /// Sub-stage label within the cohort, e.g. "A1".
    pub sub_stage: String,
}

impl StageKey {
    /// Create a new stage key.
    #[must_use]
    pub fn new(cohort: impl Into<String>, sub_stage: impl Into<String>) -> Self {
        Self {
            cohort: cohort.into(),
            sub_stage: sub_stage.into(),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cohort, self.sub_stage)
    }
}

// =============================================================================
// ADMISSION STATUS
// =============================================================================

/// Admission status of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AdmissionStatus {
    #[default]
    Postponed,
    Cancelled,
    Pending,
}

impl AdmissionStatus {
    /// Every accepted status, in declaration order.
    pub const ALL: [AdmissionStatus; 3] = [Self::Postponed, Self::Cancelled, Self::Pending];

    /// The label rules compare against.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postponed => "Postponed",
            Self::Cancelled => "Cancelled",
            Self::Pending => "Pending",
        }
    }
}

impl fmt::Display for AdmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a label is not one of the admission statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown admission status '{0}' (expected Postponed, Cancelled or Pending)")]
pub struct UnknownAdmissionStatus(pub String);

impl FromStr for AdmissionStatus {
    type Err = UnknownAdmissionStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownAdmissionStatus(s.to_string()))
    }
}

// =============================================================================
// PATIENT
// =============================================================================

/// The typed attributes consulted by transition conditions.
///
/// Counters are maintained externally and read here as plain values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientAttributes {
    pub days_since_follow_up: i64,
    pub days_since_last_contact: i64,
    pub days_until_admission: i64,

    pub clinical_intervention_required: bool,
    pub quotation_phase_required: bool,
    pub patient_ready: bool,
    pub clinical_intervention_completed: bool,
    pub quotation_accepted: bool,

    pub scheduled_admission: bool,
    pub scheduled_date_in_past: bool,
    pub admission_completed: bool,
    pub admission_status: AdmissionStatus,

    pub lead_management_ends: bool,
    pub final_response_received: bool,
    pub follow_up_attempts: String,
}

impl Default for PatientAttributes {
    fn default() -> Self {
        Self {
            days_since_follow_up: 0,
            days_since_last_contact: 0,
            days_until_admission: 0,
            clinical_intervention_required: false,
            quotation_phase_required: false,
            patient_ready: false,
            clinical_intervention_completed: false,
            quotation_accepted: false,
            scheduled_admission: false,
            scheduled_date_in_past: false,
            admission_completed: false,
            admission_status: AdmissionStatus::default(),
            lead_management_ends: false,
            final_response_received: false,
            follow_up_attempts: "None".to_string(),
        }
    }
}

/// Creation payload for a patient: everything except identity and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub current: StageKey,
    pub attributes: PatientAttributes,
}

impl NewPatient {
    /// Create a payload with default attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, current: StageKey) -> Self {
        Self {
            name: name.into(),
            current,
            attributes: PatientAttributes::default(),
        }
    }

    /// Replace the attribute set.
    #[must_use]
    pub fn with_attributes(mut self, attributes: PatientAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Attach an identity, producing a stored patient with no previous stage.
    #[must_use]
    pub fn into_patient(self, id: PatientId) -> Patient {
        Patient {
            id,
            name: self.name,
            current: self.current,
            previous: None,
            attributes: self.attributes,
        }
    }
}

/// A patient as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    /// Current pipeline position.
    pub current: StageKey,
    /// Last position before the most recent transition.
    pub previous: Option<StageKey>,
    pub attributes: PatientAttributes,
}

impl Patient {
    /// Move to `next`, remembering the current position as `previous`.
    ///
    /// Returns the position that was left.
    pub fn advance(&mut self, next: StageKey) -> StageKey {
        let left = std::mem::replace(&mut self.current, next);
        self.previous = Some(left.clone());
        left
    }
}

// =============================================================================
// TRANSITION HISTORY
// =============================================================================

/// One executed transition. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionHistory {
    pub id: HistoryId,
    pub patient: PatientId,
    pub previous: StageKey,
    pub next: StageKey,
    pub transitioned_at: DateTime<Utc>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// A problem with one field of a creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All field-level problems found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem with `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), CareflowError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CareflowError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// Errors that can occur in the Careflow system.
///
/// - Condition evaluation never produces an error
/// - Storage failures surface as `Persistence`, the only retryable kind
/// - `NoTransition` is an expected outcome, not a fault
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CareflowError {
    /// The creation payload is malformed.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// No patient with this identity exists.
    #[error("Patient not found: {0}")]
    NotFound(PatientId),

    /// The request was well formed but no rule applies from this state.
    #[error("No transition applies from {0}")]
    NoTransition(StageKey),

    /// The backing store failed; the unit of work was rolled back.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The rule table or stage registry is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored record or rule file could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Reading or writing a file or socket outside the store failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CareflowError {
    /// Whether re-running the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
