//! # Primitives
//!
//! Fixed limits compiled into the binary.

/// Maximum length of a patient display name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length of a cohort or sub-stage label, in characters.
pub const MAX_LABEL_LENGTH: usize = 50;

/// Maximum length of the `follow_up_attempts` counter text.
pub const MAX_FOLLOW_UP_ATTEMPTS_LENGTH: usize = 50;

/// Maximum number of patients accepted by one batch admission.
pub const MAX_BATCH_ADMISSIONS: usize = 10_000;

/// Maximum accepted size of a rule file, checked before parsing.
pub const MAX_RULE_FILE_SIZE: usize = 1024 * 1024; // 1 MB
