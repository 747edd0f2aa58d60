//! # Stage Registry
//!
//! Auxiliary per-stage data carried alongside a patient.
//!
//! Each cohort label maps to a [`StageKind`]. When a patient enters a cohort,
//! the attributes relevant to that kind are captured into a [`StageRecord`].
//! A patient holds at most one record; entering a new stage replaces it in a
//! single slot write instead of probing every stage table.

mod record;
mod registry;

pub use record::{StageData, StageKind, StageRecord};
pub use registry::StageRegistry;
