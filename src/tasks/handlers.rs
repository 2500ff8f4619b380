//! REST API handlers for the widget-state channel
//!
//! The widget persists its UI state here, and the host reports main-composer
//! input so state can be reset for the conversation.

use super::{models::*, state::SharedState};
use crate::error::WidgetStateError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Creates routes for widget-state operations
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/widget_state", post(persist_widget_state))
        .route("/widget_state/:widget_id", get(read_widget_state))
        .route("/composer_input", post(composer_input))
}

/// Endpoint: POST /widget_state
/// Replaces the state of a rendered widget instance with the widget's copy.
async fn persist_widget_state(
    State(state): State<SharedState>,
    Json(payload): Json<WidgetStateInput>,
) -> impl IntoResponse {
    match state.widgets.persist(&payload.widget_id, payload.state) {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "status": "updated",
                "widgetId": receipt.widget_id,
                "estimatedTokens": receipt.estimated_tokens,
                "overBudget": receipt.over_budget,
            })),
        ),
        Err(e @ WidgetStateError::NotRendered(_)) => {
            tracing::debug!("Rejected widget state: {}", e);
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "not_rendered", "message": e.to_string() })),
            )
        }
    }
}

/// Endpoint: GET /widget_state/:widget_id
async fn read_widget_state(
    State(state): State<SharedState>,
    Path(widget_id): Path<String>,
) -> impl IntoResponse {
    let phase = state.widgets.phase(&widget_id);
    let current = state.widgets.get(&widget_id).unwrap_or_default();
    Json(json!({
        "widgetId": widget_id,
        "phase": phase,
        "state": current,
    }))
}

/// Endpoint: POST /composer_input
/// The user typed into the main composer; every widget in the conversation
/// starts over.
async fn composer_input(
    State(state): State<SharedState>,
    Json(payload): Json<ComposerInput>,
) -> impl IntoResponse {
    let cleared = state.widgets.reset_conversation(&payload.conversation_id);
    Json(ResetResponse {
        status: "reset".to_string(),
        conversation_id: payload.conversation_id,
        cleared,
    })
}
