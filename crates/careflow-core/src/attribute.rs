//! # Condition Attributes
//!
//! The closed set of patient attributes a rule may consult.
//!
//! Rules name attributes by string. Those names are resolved once, when the
//! rule table is loaded, into an [`AttributeKey`]; each key has an explicit
//! accessor on [`Patient`]. A name outside the set is kept as
//! [`AttributeRef::Unknown`] and every condition on it is unsatisfiable.

use crate::Patient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// VALUE
// =============================================================================

/// A scalar on either side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    /// Numeric-looking text becomes `Int`; everything else is unchanged.
    #[must_use]
    pub fn coerced(&self) -> Value {
        match self {
            Value::Text(text) => match text.trim().parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => self.clone(),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

// =============================================================================
// ATTRIBUTE KEY
// =============================================================================

/// Every attribute a condition can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    DaysSinceFollowUp,
    DaysSinceLastContact,
    DaysUntilAdmission,
    ClinicalInterventionRequired,
    QuotationPhaseRequired,
    PatientReady,
    ClinicalInterventionCompleted,
    QuotationAccepted,
    ScheduledAdmission,
    ScheduledDateInPast,
    AdmissionCompleted,
    AdmissionStatus,
    LeadManagementEnds,
    FinalResponseReceived,
    FollowUpAttempts,
}

impl AttributeKey {
    pub const ALL: [AttributeKey; 15] = [
        Self::DaysSinceFollowUp,
        Self::DaysSinceLastContact,
        Self::DaysUntilAdmission,
        Self::ClinicalInterventionRequired,
        Self::QuotationPhaseRequired,
        Self::PatientReady,
        Self::ClinicalInterventionCompleted,
        Self::QuotationAccepted,
        Self::ScheduledAdmission,
        Self::ScheduledDateInPast,
        Self::AdmissionCompleted,
        Self::AdmissionStatus,
        Self::LeadManagementEnds,
        Self::FinalResponseReceived,
        Self::FollowUpAttempts,
    ];

    /// The name used in rule files and creation payloads.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DaysSinceFollowUp => "days_since_follow_up",
            Self::DaysSinceLastContact => "days_since_last_contact",
            Self::DaysUntilAdmission => "days_until_admission",
            Self::ClinicalInterventionRequired => "clinical_intervention_required",
            Self::QuotationPhaseRequired => "quotation_phase_required",
            Self::PatientReady => "patient_ready",
            Self::ClinicalInterventionCompleted => "clinical_intervention_completed",
            Self::QuotationAccepted => "quotation_accepted",
            Self::ScheduledAdmission => "scheduled_admission",
            Self::ScheduledDateInPast => "scheduled_date_in_past",
            Self::AdmissionCompleted => "admission_completed",
            Self::AdmissionStatus => "admission_status",
            Self::LeadManagementEnds => "lead_management_ends",
            Self::FinalResponseReceived => "final_response_received",
            Self::FollowUpAttempts => "follow_up_attempts",
        }
    }

    /// Read this attribute from a patient.
    #[must_use]
    pub fn read(&self, patient: &Patient) -> Value {
        let a = &patient.attributes;
        match self {
            Self::DaysSinceFollowUp => Value::Int(a.days_since_follow_up),
            Self::DaysSinceLastContact => Value::Int(a.days_since_last_contact),
            Self::DaysUntilAdmission => Value::Int(a.days_until_admission),
            Self::ClinicalInterventionRequired => Value::Bool(a.clinical_intervention_required),
            Self::QuotationPhaseRequired => Value::Bool(a.quotation_phase_required),
            Self::PatientReady => Value::Bool(a.patient_ready),
            Self::ClinicalInterventionCompleted => Value::Bool(a.clinical_intervention_completed),
            Self::QuotationAccepted => Value::Bool(a.quotation_accepted),
            Self::ScheduledAdmission => Value::Bool(a.scheduled_admission),
            Self::ScheduledDateInPast => Value::Bool(a.scheduled_date_in_past),
            Self::AdmissionCompleted => Value::Bool(a.admission_completed),
            Self::AdmissionStatus => Value::Text(a.admission_status.as_str().to_string()),
            Self::LeadManagementEnds => Value::Bool(a.lead_management_ends),
            Self::FinalResponseReceived => Value::Bool(a.final_response_received),
            Self::FollowUpAttempts => Value::Text(a.follow_up_attempts.clone()),
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttributeKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|key| key.name() == s).ok_or(())
    }
}

// =============================================================================
// ATTRIBUTE REFERENCE
// =============================================================================

/// An attribute as named by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeRef {
    Known(AttributeKey),
    /// A name outside the closed set. Never satisfiable.
    Unknown(String),
}

impl AttributeRef {
    /// Resolve a rule-file name.
    #[must_use]
    pub fn resolve(name: &str) -> Self {
        match name.parse::<AttributeKey>() {
            Ok(key) => Self::Known(key),
            Err(()) => Self::Unknown(name.to_string()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Known(key) => key.name(),
            Self::Unknown(name) => name,
        }
    }
}

impl From<AttributeKey> for AttributeRef {
    fn from(key: AttributeKey) -> Self {
        Self::Known(key)
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read access to attribute values for condition evaluation.
///
/// `None` means the attribute is absent from this snapshot.
pub trait Snapshot {
    fn attribute(&self, key: AttributeKey) -> Option<Value>;
}

impl Snapshot for Patient {
    fn attribute(&self, key: AttributeKey) -> Option<Value> {
        Some(key.read(self))
    }
}

impl Snapshot for std::collections::BTreeMap<AttributeKey, Value> {
    fn attribute(&self, key: AttributeKey) -> Option<Value> {
        self.get(&key).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{AdmissionStatus, NewPatient, PatientId, StageKey};

    #[test]
    fn names_round_trip() {
        for key in AttributeKey::ALL {
            assert_eq!(key.name().parse::<AttributeKey>(), Ok(key));
        }
    }

    #[test]
    fn unknown_name_is_kept() {
        let r = AttributeRef::resolve("blood_type");
        assert_eq!(r, AttributeRef::Unknown("blood_type".to_string()));
        assert_eq!(r.name(), "blood_type");
    }

    #[test]
    fn read_uses_typed_accessors() {
        let mut new = NewPatient::new("Ada", StageKey::new("Pre-Admission Prep", "B1"));
        new.attributes.days_until_admission = 3;
        new.attributes.admission_status = AdmissionStatus::Cancelled;
        new.attributes.follow_up_attempts = "2".to_string();
        let patient = new.into_patient(PatientId(7));

        assert_eq!(AttributeKey::DaysUntilAdmission.read(&patient), Value::Int(3));
        assert_eq!(
            AttributeKey::AdmissionStatus.read(&patient),
            Value::Text("Cancelled".to_string())
        );
        assert_eq!(
            AttributeKey::FollowUpAttempts.read(&patient),
            Value::Text("2".to_string())
        );
        assert_eq!(AttributeKey::PatientReady.read(&patient), Value::Bool(false));
    }

    #[test]
    fn coercion_only_touches_numeric_text() {
        assert_eq!(Value::from("5").coerced(), Value::Int(5));
        assert_eq!(Value::from(" -12 ").coerced(), Value::Int(-12));
        assert_eq!(Value::from("Y").coerced(), Value::from("Y"));
        assert_eq!(Value::from(true).coerced(), Value::Bool(true));
    }
}
