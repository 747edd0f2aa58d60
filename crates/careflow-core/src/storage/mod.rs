//! # Storage
//!
//! Persistent implementations of [`PatientStore`](crate::store::PatientStore).

mod redb_store;

pub use redb_store::{RedbStore, RedbTransaction};
