//! HTTP ingestion surface.

pub mod error;
mod middleware;
mod reports;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::queue::ReportQueue;

use middleware::{log_responses, set_request_context};

pub use reports::{health, submit_report};

#[derive(Clone)]
pub struct ApiState {
    pub queue: Arc<dyn ReportQueue>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/reports", post(submit_report))
        .route("/_health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
