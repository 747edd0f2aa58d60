//! Stage kinds and the per-patient stage record.

use crate::{AdmissionStatus, Patient, PatientId, StageKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// STAGE KIND
// =============================================================================

/// The kinds of auxiliary stage data a patient can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    NewRecommendations,
    FollowUp,
    ClinicalIntervention,
    QuotationPhase,
    ReadyToSchedule,
    PreAdmissionPrep,
    PostponedAdmissions,
    ClinicalStage,
    InitialTransition,
    FinalTransition,
    Closed,
}

impl StageKind {
    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewRecommendations => "New Recommendations",
            Self::FollowUp => "Follow-up",
            Self::ClinicalIntervention => "Clinical Intervention",
            Self::QuotationPhase => "Quotation Phase",
            Self::ReadyToSchedule => "Ready to Schedule",
            Self::PreAdmissionPrep => "Pre-Admission Prep",
            Self::PostponedAdmissions => "Postponed Admissions",
            Self::ClinicalStage => "Clinical Stage",
            Self::InitialTransition => "Initial Transition",
            Self::FinalTransition => "Final Transition",
            Self::Closed => "Closed",
        }
    }

    /// Capture the attributes relevant to this stage from `patient`.
    #[must_use]
    pub fn materialize(&self, patient: &Patient) -> StageData {
        let a = &patient.attributes;
        match self {
            Self::NewRecommendations => StageData::NewRecommendations {
                clinical_intervention_required: a.clinical_intervention_required,
                quotation_phase_required: a.quotation_phase_required,
                patient_ready: a.patient_ready,
            },
            Self::FollowUp => StageData::FollowUp {
                days_since_follow_up: a.days_since_follow_up,
                follow_up_attempts: a.follow_up_attempts.clone(),
            },
            Self::ClinicalIntervention => StageData::ClinicalIntervention {
                clinical_intervention_required: a.clinical_intervention_required,
                clinical_intervention_completed: a.clinical_intervention_completed,
                days_since_last_contact: a.days_since_last_contact,
            },
            Self::QuotationPhase => StageData::QuotationPhase {
                quotation_phase_required: a.quotation_phase_required,
                quotation_accepted: a.quotation_accepted,
                days_since_last_contact: a.days_since_last_contact,
            },
            Self::ReadyToSchedule => StageData::ReadyToSchedule {
                quotation_accepted: a.quotation_accepted,
                scheduled_admission: a.scheduled_admission,
            },
            Self::PreAdmissionPrep => StageData::PreAdmissionPrep {
                days_until_admission: a.days_until_admission,
                admission_status: a.admission_status,
            },
            Self::PostponedAdmissions => StageData::PostponedAdmissions {
                admission_status: a.admission_status,
                scheduled_date_in_past: a.scheduled_date_in_past,
                admission_completed: a.admission_completed,
            },
            Self::ClinicalStage => StageData::ClinicalStage {
                clinical_intervention_completed: a.clinical_intervention_completed,
                admission_completed: a.admission_completed,
            },
            Self::InitialTransition => StageData::InitialTransition {
                lead_management_ends: a.lead_management_ends,
            },
            Self::FinalTransition => StageData::FinalTransition {
                follow_up_attempts: a.follow_up_attempts.clone(),
                final_response_received: a.final_response_received,
            },
            Self::Closed => StageData::Closed {
                final_response_received: a.final_response_received,
            },
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// STAGE DATA
// =============================================================================

/// Stage-specific data, one variant per [`StageKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageData {
    NewRecommendations {
        clinical_intervention_required: bool,
        quotation_phase_required: bool,
        patient_ready: bool,
    },
    FollowUp {
        days_since_follow_up: i64,
        follow_up_attempts: String,
    },
    ClinicalIntervention {
        clinical_intervention_required: bool,
        clinical_intervention_completed: bool,
        days_since_last_contact: i64,
    },
    QuotationPhase {
        quotation_phase_required: bool,
        quotation_accepted: bool,
        days_since_last_contact: i64,
    },
    ReadyToSchedule {
        quotation_accepted: bool,
        scheduled_admission: bool,
    },
    PreAdmissionPrep {
        days_until_admission: i64,
        admission_status: AdmissionStatus,
    },
    PostponedAdmissions {
        admission_status: AdmissionStatus,
        scheduled_date_in_past: bool,
        admission_completed: bool,
    },
    ClinicalStage {
        clinical_intervention_completed: bool,
        admission_completed: bool,
    },
    InitialTransition {
        lead_management_ends: bool,
    },
    FinalTransition {
        follow_up_attempts: String,
        final_response_received: bool,
    },
    Closed {
        final_response_received: bool,
    },
}

impl StageData {
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::NewRecommendations { .. } => StageKind::NewRecommendations,
            Self::FollowUp { .. } => StageKind::FollowUp,
            Self::ClinicalIntervention { .. } => StageKind::ClinicalIntervention,
            Self::QuotationPhase { .. } => StageKind::QuotationPhase,
            Self::ReadyToSchedule { .. } => StageKind::ReadyToSchedule,
            Self::PreAdmissionPrep { .. } => StageKind::PreAdmissionPrep,
            Self::PostponedAdmissions { .. } => StageKind::PostponedAdmissions,
            Self::ClinicalStage { .. } => StageKind::ClinicalStage,
            Self::InitialTransition { .. } => StageKind::InitialTransition,
            Self::FinalTransition { .. } => StageKind::FinalTransition,
            Self::Closed { .. } => StageKind::Closed,
        }
    }
}

// =============================================================================
// STAGE RECORD
// =============================================================================

/// The data materialized for a patient's present stage.
///
/// A patient owns at most one record. Entering a stage replaces it whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub patient: PatientId,
    /// The state that was entered when this record was created.
    pub stage: StageKey,
    pub created_at: DateTime<Utc>,
    pub data: StageData,
}

impl StageRecord {
    #[must_use]
    pub fn kind(&self) -> StageKind {
        self.data.kind()
    }
}
