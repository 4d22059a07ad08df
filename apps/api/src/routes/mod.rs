pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::events::handle_event;
use crate::memory::handle_chat;
use crate::read_model::{handle_get_job, handle_list_jobs};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Storage event ingestion
        .route("/api/v1/events", post(handle_event))
        // Read model
        .route("/api/v1/jobs", get(handle_list_jobs))
        .route("/api/v1/jobs/:job_id", get(handle_get_job))
        // Follow-up chat
        .route("/api/v1/chat", post(handle_chat))
        .with_state(state)
}
