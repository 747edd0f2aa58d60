//! # Formats
//!
//! Serialized representations consumed by the engine.
//!
//! The engine itself never touches the filesystem. Callers read a rule file
//! and hand its text to one of the parsers here.

pub mod rule_file;

pub use rule_file::{
    DEFAULT_RULES_TOML, RuleFile, workflow_from_json, workflow_from_toml, workflow_to_json,
};
