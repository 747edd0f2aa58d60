//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState, HistoryEntry, PatientJson, PatientPayload};
use careflow_core::{
    CareflowError, Intake, NewPatient, PatientId, PatientStore, RedbStore, TransitionExecutor,
    TransitionOutcome, ValidationErrors, Workflow,
    primitives::{MAX_BATCH_ADMISSIONS, MAX_RULE_FILE_SIZE},
    workflow_from_json, workflow_from_toml, workflow_to_json,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for admission batches (16 MB).
const MAX_ADMIT_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CareflowError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CareflowError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CareflowError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and ".."), and rejects
/// anything that is not an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CareflowError> {
    let canonical = path.canonicalize().map_err(|e| {
        CareflowError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CareflowError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate and read a bounded input file.
fn read_input(path: &Path, max_size: u64) -> Result<String, CareflowError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, max_size)?;
    std::fs::read_to_string(&path)
        .map_err(|e| CareflowError::Io(format!("Cannot read '{}': {}", path.display(), e)))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    rules: Option<&Path>,
    host: &str,
    port: u16,
    ephemeral: bool,
) -> Result<(), CareflowError> {
    let workflow = load_workflow(rules)?;
    let store = if ephemeral {
        RedbStore::in_memory()?
    } else {
        open_store(db_path)?
    };

    for cohort in workflow.unmapped_cohorts() {
        tracing::warn!(cohort, "rules target a cohort with no stage kind");
    }

    println!("Careflow Patient Pipeline Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    if ephemeral {
        println!("  Database: (in memory)");
    } else {
        println!("  Database: {:?}", db_path);
    }
    println!(
        "  Rules:    {}",
        rules.map_or_else(|| "built-in".to_string(), |p| p.display().to_string())
    );
    println!();
    println!("Endpoints:");
    println!("  GET    /health                  - Health check");
    println!("  GET    /patients                - List patient ids");
    println!("  POST   /patients                - Admit a patient");
    println!("  GET    /patients/{{id}}           - Read a patient");
    println!("  DELETE /patients/{{id}}           - Delete a patient");
    println!("  PUT    /patients/{{id}}/transition - Trigger a transition");
    println!("  GET    /patients/{{id}}/history   - Transition history");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, AppState::new(store, workflow)).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), CareflowError> {
    if db_path.exists() {
        if !force {
            return Err(CareflowError::Configuration(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| CareflowError::Io(format!("Cannot remove old database: {}", e)))?;
    }

    let _store = RedbStore::open(db_path)?;
    println!("Initialized new redb database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// ADMIT COMMAND
// =============================================================================

/// Admit patients from a JSON file.
///
/// Every entry is validated before anything is written, and the batch is
/// stored in one transaction: either every patient is admitted or none is.
pub fn cmd_admit(
    db_path: &Path,
    rules: Option<&Path>,
    json_mode: bool,
    file: &Path,
) -> Result<(), CareflowError> {
    let workflow = load_workflow(rules)?;
    let contents = read_input(file, MAX_ADMIT_FILE_SIZE)?;

    let parsed: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| CareflowError::Serialization(format!("Invalid JSON: {}", e)))?;
    let entries = match parsed {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };

    if entries.len() > MAX_BATCH_ADMISSIONS {
        return Err(CareflowError::Serialization(format!(
            "Patient count {} exceeds maximum allowed {}",
            entries.len(),
            MAX_BATCH_ADMISSIONS
        )));
    }

    let mut batch: Vec<NewPatient> = Vec::with_capacity(entries.len());
    let mut errors = ValidationErrors::new();
    for (index, entry) in entries.into_iter().enumerate() {
        match PatientPayload(entry).to_new_patient() {
            Ok(patient) => batch.push(patient),
            Err(entry_errors) => {
                for e in entry_errors.0 {
                    errors.push(format!("[{}].{}", index, e.field), e.message);
                }
            }
        }
    }
    errors.into_result()?;

    let store = open_store(db_path)?;
    let admitted = Intake::admit_batch(&store, &workflow, batch)?;

    if json_mode {
        let ids: Vec<u64> = admitted.iter().map(|p| p.id.0).collect();
        print_json(&serde_json::json!({
            "success": true,
            "admitted": ids.len(),
            "patient_ids": ids,
        }));
        return Ok(());
    }

    println!("Admitted {} patients", admitted.len());
    for patient in &admitted {
        println!("  #{} {} at {}", patient.id, patient.name, patient.current);
    }
    Ok(())
}

// =============================================================================
// TRANSITION COMMAND
// =============================================================================

/// Apply the first matching rule to a patient.
pub fn cmd_transition(
    db_path: &Path,
    rules: Option<&Path>,
    json_mode: bool,
    patient: u64,
) -> Result<(), CareflowError> {
    let workflow = load_workflow(rules)?;
    let store = open_store(db_path)?;

    match TransitionExecutor::new(&store, &workflow).execute(PatientId(patient)) {
        TransitionOutcome::Applied(transition) => {
            if json_mode {
                print_json(&serde_json::json!({
                    "applied": true,
                    "patient_id": patient,
                    "previous": transition.previous,
                    "next": transition.next,
                    "stage": transition.stage,
                }));
            } else {
                println!(
                    "Patient #{}: {} -> {}",
                    patient, transition.previous, transition.next
                );
                println!("Stage record: {}", transition.stage.kind());
            }
            Ok(())
        }
        TransitionOutcome::NoMatch(current) => {
            if json_mode {
                print_json(&serde_json::json!({
                    "applied": false,
                    "patient_id": patient,
                    "current": current,
                }));
            } else {
                println!("Patient #{}: no rule applies at {}", patient, current);
            }
            Ok(())
        }
        TransitionOutcome::NotFound(id) => Err(CareflowError::NotFound(id)),
        TransitionOutcome::Failed(e) => Err(e),
    }
}

// =============================================================================
// HISTORY COMMAND
// =============================================================================

/// Show a patient's transition history.
pub fn cmd_history(db_path: &Path, json_mode: bool, patient: u64) -> Result<(), CareflowError> {
    let store = open_store(db_path)?;
    let id = PatientId(patient);
    let history = store
        .patient_history(id)?
        .ok_or(CareflowError::NotFound(id))?;

    if json_mode {
        let entries: Vec<HistoryEntry> = history.iter().map(HistoryEntry::from).collect();
        print_json(&serde_json::json!({
            "patient_id": patient,
            "history": entries,
        }));
        return Ok(());
    }

    println!("History of patient #{}", patient);
    println!("=======================");
    if history.is_empty() {
        println!("(no transitions)");
    }
    for record in &history {
        println!(
            "{}  {} -> {}",
            record.transitioned_at.to_rfc3339(),
            record.previous,
            record.next
        );
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show a patient with its stage record, or list all patient ids.
pub fn cmd_show(db_path: &Path, json_mode: bool, patient: Option<u64>) -> Result<(), CareflowError> {
    let store = open_store(db_path)?;

    let Some(patient) = patient else {
        let ids = store.patient_ids()?;
        if json_mode {
            let ids: Vec<u64> = ids.iter().map(|id| id.0).collect();
            print_json(&serde_json::json!({ "patient_ids": ids }));
        } else {
            println!("{} patients", ids.len());
            for id in ids {
                println!("  #{}", id);
            }
        }
        return Ok(());
    };

    let id = PatientId(patient);
    let (record, stage) = store
        .patient_with_stage(id)?
        .ok_or(CareflowError::NotFound(id))?;

    if json_mode {
        print_json(&serde_json::json!({
            "patient": PatientJson::from(&record),
            "stage": stage,
        }));
        return Ok(());
    }

    println!("Patient #{}: {}", record.id, record.name);
    println!("  State:    {}", record.current);
    if let Some(previous) = &record.previous {
        println!("  Previous: {}", previous);
    }
    match stage {
        Some(stage) => println!("  Stage:    {} (since {})", stage.kind(), stage.created_at.to_rfc3339()),
        None => println!("  Stage:    (none)"),
    }
    Ok(())
}

// =============================================================================
// RULES COMMAND
// =============================================================================

/// Print the rule table and stage map.
pub fn cmd_rules(rules: Option<&Path>, json_mode: bool, verbose: bool) -> Result<(), CareflowError> {
    let workflow = load_workflow(rules)?;
    let unmapped = workflow.unmapped_cohorts();
    for cohort in &unmapped {
        tracing::warn!(cohort = *cohort, "rules target a cohort with no stage kind");
    }

    if json_mode {
        println!("{}", workflow_to_json(&workflow)?);
        return Ok(());
    }

    println!("Transition Rules ({})", workflow.rules().len());
    println!("================");
    for (index, rule) in workflow.rules().rules().iter().enumerate() {
        println!("{:>3}. {} -> {}", index + 1, rule.source, rule.next);
        if verbose {
            for condition in &rule.actions {
                println!("       action:      {}", condition);
            }
            for condition in &rule.dispositions {
                println!("       disposition: {}", condition);
            }
        }
    }
    println!();
    println!("Stage Map ({})", workflow.stages().len());
    println!("=========");
    for (cohort, kind) in workflow.stages().entries() {
        println!("  {:<36} {}", cohort, kind);
    }
    if !unmapped.is_empty() {
        println!();
        println!("Unmapped target cohorts: {}", unmapped.join(", "));
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load the workflow from a rule file, or the built-in one.
///
/// Files ending in `.json` are parsed as JSON, anything else as TOML.
pub fn load_workflow(rules: Option<&Path>) -> Result<Workflow, CareflowError> {
    let Some(path) = rules else {
        return Workflow::builtin();
    };

    let text = read_input(path, MAX_RULE_FILE_SIZE as u64)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let workflow = if is_json {
        workflow_from_json(&text)?
    } else {
        workflow_from_toml(&text)?
    };
    tracing::debug!(
        path = %path.display(),
        rules = workflow.rules().len(),
        "rule file loaded"
    );
    Ok(workflow)
}

/// Open (or create) the patient database.
pub fn open_store(db_path: &Path) -> Result<RedbStore, CareflowError> {
    RedbStore::open(db_path)
}
