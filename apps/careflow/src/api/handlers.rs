//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! redb calls block (a write transaction waits for the previous writer), so
//! every store access runs on the blocking thread pool.

use super::{
    AppState,
    types::{
        AdmitResponse, DeleteResponse, HealthResponse, HistoryResponse, PatientListResponse,
        PatientPayload, PatientResponse, TransitionResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use careflow_core::{
    CareflowError, Intake, PatientId, PatientStore, RedbStore, TransitionExecutor,
    TransitionOutcome, Workflow,
};

const PATIENT_NOT_FOUND: &str = "Patient not found";

/// Run a store operation on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, task: F) -> Result<T, CareflowError>
where
    T: Send + 'static,
    F: FnOnce(&RedbStore, &Workflow) -> Result<T, CareflowError> + Send + 'static,
{
    let AppState { store, workflow } = state.clone();
    tokio::task::spawn_blocking(move || task(&store, &workflow))
        .await
        .map_err(|e| CareflowError::Persistence(format!("storage task failed: {}", e)))?
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// ADMIT HANDLER
// =============================================================================

/// Admit a new patient. The transition engine does not run on creation.
pub async fn admit_handler(
    State(state): State<AppState>,
    Json(payload): Json<PatientPayload>,
) -> impl IntoResponse {
    let new_patient = match payload.to_new_patient() {
        Ok(p) => p,
        Err(errors) => {
            return (StatusCode::BAD_REQUEST, Json(AdmitResponse::invalid(errors)));
        }
    };

    let result = run_blocking(&state, move |store, workflow| {
        Intake::admit(store, workflow, new_patient)
    })
    .await;

    match result {
        Ok(patient) => (StatusCode::CREATED, Json(AdmitResponse::success(&patient))),
        Err(CareflowError::Validation(errors)) => {
            (StatusCode::BAD_REQUEST, Json(AdmitResponse::invalid(errors)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdmitResponse::error(format!("Admission failed: {}", e))),
        ),
    }
}

// =============================================================================
// PATIENT HANDLERS
// =============================================================================

/// List stored patient ids.
pub async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    match run_blocking(&state, |store, _| store.patient_ids()).await {
        Ok(ids) => (StatusCode::OK, Json(PatientListResponse::success(&ids))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(PatientListResponse::error(format!("Listing failed: {}", e))),
        ),
    }
}

/// Read back one patient with its current stage record.
pub async fn patient_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let id = PatientId(id);
    match run_blocking(&state, move |store, _| store.patient_with_stage(id)).await {
        Ok(Some((patient, stage))) => (
            StatusCode::OK,
            Json(PatientResponse::success(&patient, stage)),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(PatientResponse::error(PATIENT_NOT_FOUND)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(PatientResponse::error(format!("Read failed: {}", e))),
        ),
    }
}

/// Delete a patient together with its history and stage record.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let id = PatientId(id);
    match run_blocking(&state, move |store, _| store.delete_patient(id)).await {
        Ok(true) => {
            tracing::info!(patient = %id, "patient deleted");
            (StatusCode::OK, Json(DeleteResponse::success()))
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(DeleteResponse::error(PATIENT_NOT_FOUND)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(DeleteResponse::error(format!("Delete failed: {}", e))),
        ),
    }
}

// =============================================================================
// TRANSITION HANDLER
// =============================================================================

/// Advance a patient by at most one rule.
///
/// - 200: a rule matched and was committed
/// - 400: no rule applies; nothing changed
/// - 404: unknown patient
/// - 500: rolled back; `retryable` tells whether to try again
pub async fn transition_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let patient_id = PatientId(id);
    let outcome = run_blocking(&state, move |store, workflow| {
        Ok(TransitionExecutor::new(store, workflow).execute(patient_id))
    })
    .await;

    match outcome {
        Ok(TransitionOutcome::Applied(transition)) => (
            StatusCode::OK,
            Json(TransitionResponse::applied(id, &transition)),
        ),
        Ok(TransitionOutcome::NoMatch(current)) => (
            StatusCode::BAD_REQUEST,
            Json(TransitionResponse::no_match(id, &current)),
        ),
        Ok(TransitionOutcome::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(TransitionResponse::error(PATIENT_NOT_FOUND)),
        ),
        Ok(TransitionOutcome::Failed(e)) | Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TransitionResponse::failed(&e)),
        ),
    }
}

// =============================================================================
// HISTORY HANDLER
// =============================================================================

/// Transition history of a patient, oldest first.
pub async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let patient_id = PatientId(id);
    let result = run_blocking(&state, move |store, _| store.patient_history(patient_id)).await;

    match result {
        Ok(Some(history)) => (
            StatusCode::OK,
            Json(HistoryResponse::success(id, &history)),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(HistoryResponse::error(PATIENT_NOT_FOUND)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HistoryResponse::error(format!("History failed: {}", e))),
        ),
    }
}
