//! Dashboard JSON API: read access to every store, the explicit
//! mark-as-viewed transition, and a single-flight trigger for full pipeline
//! runs.

pub mod dtos;
pub mod handlers;

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::pipeline::Pipeline;

/// What the dashboard shows about an in-flight (or the last) pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub current_step: String,
    pub message: String,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub run: Arc<Mutex<RunStatus>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            run: Arc::new(Mutex::new(RunStatus::default())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/stats", get(handlers::stats))
        .route("/api/jobs", get(handlers::list_jobs))
        .route("/api/matches", get(handlers::list_matches))
        .route("/api/jobs/view", post(handlers::mark_viewed))
        .route("/api/run", post(handlers::trigger_run))
        .route("/api/run/status", get(handlers::run_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
