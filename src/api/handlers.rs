use super::{ApiError, AppState};
use crate::events::validator::{validate_create, validate_delete, validate_update};
use crate::events::{Event, Intent};
use crate::Error;
use axum::{
    body::Bytes,
    extract::{Path, State},
};
use tracing::{debug, error, info};

pub const PUBLISHED: &str = "Message sent to Kafka!";

pub async fn index() -> &'static str {
    "Hello, cat events!"
}

pub async fn create_cat(State(state): State<AppState>, body: Bytes) -> Result<&'static str, ApiError> {
    debug!(body = %String::from_utf8_lossy(&body), "Create cat request");
    let intent = validate_create(&body)?;
    publish_intent(&state, intent).await
}

pub async fn update_cat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    debug!(id = %id, body = %String::from_utf8_lossy(&body), "Update cat request");
    let intent = validate_update(&id, &body)?;
    publish_intent(&state, intent).await
}

pub async fn delete_cat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<&'static str, ApiError> {
    debug!(id = %id, "Delete cat request");
    let intent = validate_delete(&id)?;
    publish_intent(&state, intent).await
}

/// Runs the publish on its own task so that a client hanging up does not
/// abandon a publish that is already in flight.
async fn publish_intent(state: &AppState, intent: Intent) -> Result<&'static str, ApiError> {
    let event = Event::from_intent(&intent, &state.key_strategy)?;
    let publisher = state.publisher.clone();

    let receipt = tokio::spawn(async move { publisher.publish(&event).await })
        .await
        .map_err(|e| {
            error!(error = %e, "Publish task failed");
            Error::delivery(format!("Publish task failed: {}", e))
        })??;

    info!(
        kind = %intent.kind(),
        topic = %receipt.topic,
        partition = receipt.partition,
        offset = receipt.offset,
        attempts = receipt.attempts,
        "Cat event published"
    );
    Ok(PUBLISHED)
}
