//! # careflow
//!
//! HTTP API and CLI for the Careflow transition engine.
//!
//! The binary in `main.rs` only sets up logging and dispatches to [`cli`].

pub mod api;
pub mod cli;
