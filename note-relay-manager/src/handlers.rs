use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use note_relay_core::bus::Envelope;
use note_relay_core::{Message, PublishError};

use crate::state::{AppState, ErrorResponse};

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Publish a local message. Responds 202 with the stored message.
///
/// A body that is not JSON is reported like any other decode failure.
pub async fn publish_handler(
    State(state): State<AppState>,
    body: Result<Json<Envelope>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), (StatusCode, Json<ErrorResponse>)> {
    let Json(envelope) = body.map_err(|rejection| {
        tracing::info!("Publish rejected: {}", rejection.body_text());
        decode_error_response(rejection.body_text())
    })?;

    match state.relay.publish(&envelope).await {
        Ok(message) => Ok((StatusCode::ACCEPTED, Json(message))),
        Err(e) => {
            tracing::info!("Publish failed: {}", e);
            Err(publish_error_response(e))
        }
    }
}

fn publish_error_response(err: PublishError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        PublishError::Decode(e) => decode_error_response(e.to_string()),
        PublishError::Relay { message, source } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                status: "error".to_string(),
                kind: "relay".to_string(),
                message: source.to_string(),
                message_id: Some(message.id),
            }),
        ),
    }
}

fn decode_error_response(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            status: "error".to_string(),
            kind: "decode".to_string(),
            message,
            message_id: None,
        }),
    )
}

pub async fn list_local_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.relay.list_local())
}

pub async fn list_remote_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.relay.list_remote())
}
