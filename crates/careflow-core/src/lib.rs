//! # careflow-core
//!
//! The cohort transition engine for Careflow - THE LOGIC.
//!
//! A patient sits in exactly one (cohort, sub-stage) pair. An ordered rule
//! table decides whether it may advance, based on the patient's attributes.
//! Applying a transition moves the patient, appends a history record and
//! replaces the patient's stage record, as one atomic unit of work.
//!
//! ## Layout
//!
//! - `rules`, `condition`, `matcher`: the pure decision logic
//! - `stage`, `workflow`: read-only configuration built at startup
//! - `store`, `storage`: the repository boundary and its redb implementation
//! - `executor`, `intake`: the operations callers invoke
//! - `formats`: rule file parsing
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Condition evaluation never fails; unknown attributes evaluate `false`
//! - Rules are scanned in declaration order; the first satisfied rule wins

// =============================================================================
// MODULES
// =============================================================================

pub mod attribute;
pub mod condition;
pub mod executor;
pub mod formats;
pub mod intake;
pub mod matcher;
pub mod primitives;
pub mod rules;
pub mod stage;
pub mod storage;
pub mod store;
pub mod types;
pub mod workflow;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AdmissionStatus, CareflowError, FieldError, HistoryId, NewPatient, Patient,
    PatientAttributes, PatientId, StageKey, TransitionHistory, UnknownAdmissionStatus,
    ValidationErrors,
};

// =============================================================================
// RE-EXPORTS: Transition Engine
// =============================================================================

pub use attribute::{AttributeKey, AttributeRef, Snapshot, Value};
pub use condition::{Condition, Operator, evaluate};
pub use executor::{Transition, TransitionExecutor, TransitionOutcome};
pub use intake::Intake;
pub use matcher::RuleMatcher;
pub use rules::{RuleTable, TransitionRule};
pub use stage::{StageData, StageKind, StageRecord, StageRegistry};
pub use workflow::Workflow;

// =============================================================================
// RE-EXPORTS: Storage and Formats
// =============================================================================

pub use formats::{DEFAULT_RULES_TOML, workflow_from_json, workflow_from_toml, workflow_to_json};
pub use storage::{RedbStore, RedbTransaction};
pub use store::{PatientStore, StoreTransaction};
