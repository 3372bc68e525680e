//! HTTP routing for the cat mutation endpoints.

pub mod error;
mod handlers;

use crate::kafka::KeyStrategy;
use crate::publisher::EventPublisher;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared by every request. The publisher is injected, never built per call.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn EventPublisher>,
    pub key_strategy: KeyStrategy,
}

impl AppState {
    pub fn new(publisher: Arc<dyn EventPublisher>, key_strategy: KeyStrategy) -> Self {
        Self {
            publisher,
            key_strategy,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/cats", post(handlers::create_cat))
        .route(
            "/cats/{id}",
            patch(handlers::update_cat).delete(handlers::delete_cat),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
