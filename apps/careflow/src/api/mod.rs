//! # Careflow HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /patients` - List patient ids
//! - `POST /patients` - Admit a patient
//! - `GET /patients/{id}` - Read a patient and its stage record
//! - `DELETE /patients/{id}` - Delete a patient, its history and stage record
//! - `PUT /patients/{id}/transition` - Apply the first matching rule
//! - `GET /patients/{id}/history` - Transition history, oldest first
//!
//! Request bodies are capped at [`MAX_BODY_SIZE`]. Store access runs on the
//! blocking pool, see [`handlers`].

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `careflow::api::*`)
pub use handlers::{
    admit_handler, delete_handler, health_handler, history_handler, list_handler,
    patient_handler, transition_handler,
};
pub use types::{
    AdmitResponse, DeleteResponse, HealthResponse, HistoryEntry, HistoryResponse,
    PatientJson, PatientListResponse, PatientPayload, PatientResponse, TransitionResponse,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};
use careflow_core::{CareflowError, RedbStore, Workflow};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected with 413.
///
/// A single patient payload is a flat object of a few hundred bytes.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the store and the read-only workflow.
///
/// The store serializes writers itself, so no lock is held here.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RedbStore>,
    pub workflow: Arc<Workflow>,
}

impl AppState {
    #[must_use]
    pub fn new(store: RedbStore, workflow: Workflow) -> Self {
        Self {
            store: Arc::new(store),
            workflow: Arc::new(workflow),
        }
    }
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints.
///
/// Every request is traced; bodies above [`MAX_BODY_SIZE`] are refused.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/patients",
            get(handlers::list_handler).post(handlers::admit_handler),
        )
        .route(
            "/patients/{id}",
            get(handlers::patient_handler).delete(handlers::delete_handler),
        )
        .route(
            "/patients/{id}/transition",
            put(handlers::transition_handler),
        )
        .route("/patients/{id}/history", get(handlers::history_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), CareflowError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CareflowError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Careflow HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| CareflowError::Io(format!("Server error: {}", e)))
}
