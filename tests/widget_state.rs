//! Integration tests for the widget-state channel
//!
//! Widget state follows the widget instance: it survives tool calls made from
//! the widget's own controls and resets only when the user types into the
//! main composer.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use taskflow_rust::config::AppSettings;
use taskflow_rust::router::create_app_router;
use taskflow_rust::tasks::AppState;

fn create_test_app_with(settings: AppSettings) -> axum::Router {
    let state = Arc::new(AppState::with_settings(settings).unwrap());
    create_app_router(state)
}

fn create_test_app() -> axum::Router {
    create_test_app_with(AppSettings::default())
}

/// Helper function to send a JSON request and get the response (REST API)
async fn send_rest_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

async fn read_widget_state(app: &axum::Router, widget_id: &str) -> (StatusCode, Value) {
    send_rest_request(app, "GET", &format!("/widget_state/{}", widget_id), None).await
}

/// Calls `taskflow_list_tasks` with the given host `_meta` and returns the result.
async fn list_tasks(app: &axum::Router, meta: Value) -> Value {
    let request_body = json!({
        "jsonrpc": "2.0",
        "method": "tools/call",
        "params": { "name": "taskflow_list_tasks", "arguments": {}, "_meta": meta },
        "id": 1
    });
    let (status, body) = send_rest_request(app, "POST", "/mcp", Some(request_body)).await;
    assert_eq!(status, StatusCode::OK);
    body["result"].clone()
}

#[tokio::test]
async fn test_state_survives_widget_calls_and_resets_on_composer_input() {
    let app = create_test_app();

    // First render seeds the instance
    let first = list_tasks(&app, json!({ "openai/conversationId": "conv-1" })).await;
    let widget_id = first["_meta"]["openai/widgetSessionId"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(first["_meta"]["widgetState"]["view"], "list");
    assert!(first["_meta"]["widgetState"]["selectedTaskId"].is_null());

    // The widget persists a selection
    let (status, body) = send_rest_request(
        &app,
        "POST",
        "/widget_state",
        Some(json!({
            "widgetId": widget_id,
            "state": { "view": "list", "selectedTaskId": "task_42" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "updated");
    assert_eq!(body["overBudget"], false);

    // A call from the widget's own controls keeps it
    let widget_meta = json!({
        "openai/conversationId": "conv-1",
        "openai/widgetSessionId": widget_id
    });
    let again = list_tasks(&app, widget_meta.clone()).await;
    assert_eq!(again["_meta"]["openai/widgetSessionId"], widget_id.as_str());
    assert_eq!(again["_meta"]["widgetState"]["selectedTaskId"], "task_42");

    // Typing in the composer resets the conversation
    let (status, body) = send_rest_request(
        &app,
        "POST",
        "/composer_input",
        Some(json!({ "conversationId": "conv-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "reset");
    assert_eq!(body["cleared"], 1);

    let (_, body) = read_widget_state(&app, &widget_id).await;
    assert_eq!(body["phase"], "uninitialized");
    assert!(body["state"].is_null());

    // The next render starts from the seed again
    let reseeded = list_tasks(&app, widget_meta).await;
    assert!(reseeded["_meta"]["widgetState"]["selectedTaskId"].is_null());
}

#[tokio::test]
async fn test_composer_input_only_touches_its_conversation() {
    let app = create_test_app();

    let mine = list_tasks(&app, json!({ "openai/conversationId": "conv-a" })).await;
    let theirs = list_tasks(&app, json!({ "openai/conversationId": "conv-b" })).await;
    let their_id = theirs["_meta"]["openai/widgetSessionId"].as_str().unwrap().to_string();
    assert_ne!(mine["_meta"]["openai/widgetSessionId"], their_id.as_str());

    let (_, body) = send_rest_request(
        &app,
        "POST",
        "/composer_input",
        Some(json!({ "conversationId": "conv-a" })),
    )
    .await;
    assert_eq!(body["cleared"], 1);

    let (_, body) = read_widget_state(&app, &their_id).await;
    assert_eq!(body["phase"], "active");
    assert_eq!(body["state"]["view"], "list");
}

#[tokio::test]
async fn test_persist_requires_rendered_widget() {
    let app = create_test_app();

    let (status, body) = send_rest_request(
        &app,
        "POST",
        "/widget_state",
        Some(json!({ "widgetId": "widget_never_rendered", "state": { "view": "list" } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_rendered");
}

#[tokio::test]
async fn test_oversized_state_is_flagged_but_kept() {
    let app = create_test_app_with(AppSettings {
        widget_state_token_budget: 8,
        ..AppSettings::default()
    });

    let first = list_tasks(&app, json!({})).await;
    let widget_id = first["_meta"]["openai/widgetSessionId"]
        .as_str()
        .unwrap()
        .to_string();

    let big = json!({ "view": "list", "notes": "x".repeat(200) });
    let (status, body) = send_rest_request(
        &app,
        "POST",
        "/widget_state",
        Some(json!({ "widgetId": widget_id, "state": big })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overBudget"], true);
    assert!(body["estimatedTokens"].as_u64().unwrap() > 8);

    let (_, body) = read_widget_state(&app, &widget_id).await;
    assert_eq!(body["state"]["notes"].as_str().unwrap().len(), 200);
}

#[tokio::test]
async fn test_idle_state_goes_stale() {
    let app = create_test_app_with(AppSettings {
        widget_state_ttl_secs: 0,
        ..AppSettings::default()
    });

    let first = list_tasks(&app, json!({})).await;
    let widget_id = first["_meta"]["openai/widgetSessionId"]
        .as_str()
        .unwrap()
        .to_string();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (_, body) = read_widget_state(&app, &widget_id).await;
    assert_eq!(body["phase"], "stale");
    assert!(body["state"].is_null());

    // A persistence call from the widget reactivates the instance
    let (status, _) = send_rest_request(
        &app,
        "POST",
        "/widget_state",
        Some(json!({ "widgetId": widget_id, "state": { "view": "detail" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_widget_reads_as_uninitialized() {
    let app = create_test_app();

    let (status, body) = send_rest_request(&app, "GET", "/widget_state/widget_unknown", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["widgetId"], "widget_unknown");
    assert_eq!(body["phase"], "uninitialized");
    assert!(body["state"].is_null());
}
