//! MCP (Model Context Protocol) route handlers
//!
//! Method dispatch for the Taskflow server. `handle_tool_call` is public so
//! tests can drive tools without going through HTTP.

use super::{helpers::*, models::*};
use crate::apps::widget::{META_OUTPUT_TEMPLATE, META_WIDGET_STATE, WIDGET_MIME_TYPE};
use crate::apps::CallContext;
use crate::tasks::state::{AppState, SharedState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::{json, Value};

/// Creates routes for MCP-related operations
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(handle_mcp).get(handle_mcp_sse))
        .route("/mcp", post(handle_mcp).get(handle_mcp_sse))
        .route("/mcp/", post(handle_mcp).get(handle_mcp_sse))
}

/// Handle SSE (Server-Sent Events) handshake for GET requests
async fn handle_mcp_sse() -> impl IntoResponse {
    (
        [("content-type", "text/event-stream")],
        "event: endpoint\ndata: /mcp\n\n",
    )
}

/// Endpoint: POST /mcp
async fn handle_mcp(
    State(state): State<SharedState>,
    body: Result<Json<JsonRpcRequest>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    let req = match body {
        Ok(Json(r)) => r,
        Err(e) => {
            tracing::warn!("JSON parse error: {}", e.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(rpc_error(Value::Null, PARSE_ERROR, "Parse error")),
            )
                .into_response();
        }
    };

    let id = req.id.unwrap_or(Value::Null);
    let method_name = req.method.as_str();
    let params = req.params.unwrap_or(Value::Null);

    tracing::debug!(method = method_name, id = %id, "MCP call");

    let response_body = match method_name {
        "initialize" => rpc_success(id, handle_initialize()),
        "notifications/initialized" => rpc_success(id, json!({})),
        "tools/list" => rpc_success(id, handle_tools_list(&state)),
        "resources/list" => rpc_success(id, handle_resources_list(&state)),
        "resources/read" => match handle_resources_read(&state, &params).await {
            Ok(result) => rpc_success(id, result),
            Err((code, msg)) => rpc_error(id, code, msg),
        },
        "tools/call" => {
            let tool_name = params.get("name").and_then(Value::as_str).unwrap_or("");
            let args = params.get("arguments").cloned().unwrap_or(Value::Null);

            match handle_tool_call(&state, tool_name, args, params.get("_meta")) {
                Ok(result) => rpc_success(id, result),
                Err(msg) => rpc_error(id, INVALID_PARAMS, msg),
            }
        }
        "ping" => rpc_success(id, json!({})),
        _ => {
            tracing::warn!("Unknown method: {}", method_name);
            rpc_error(id, METHOD_NOT_FOUND, "Method not found")
        }
    };

    Json(response_body).into_response()
}

// =============================================================================
// MCP Method Handlers
// =============================================================================

/// Handles `initialize` request (Handshake).
fn handle_initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": true },
            "resources": { "listChanged": true, "subscribe": true }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Handles `tools/list` request.
fn handle_tools_list(state: &AppState) -> Value {
    let tools: Vec<Value> = state
        .registry
        .definitions()
        .map(|def| {
            let mut listing = def.listing();
            listing["_meta"] = Value::Object(state.template.tool_meta(def, None));
            listing
        })
        .collect();
    json!({ "tools": tools })
}

/// Handles `resources/list` request.
fn handle_resources_list(state: &AppState) -> Value {
    let template = &state.template;
    json!({
        "resources": [{
            "name": template.name,
            "uri": template.uri,
            "description": template.description,
            "mimeType": WIDGET_MIME_TYPE,
            "_meta": template.resource_meta()
        }]
    })
}

/// Handles `resources/read` request.
async fn handle_resources_read(state: &AppState, params: &Value) -> Result<Value, (i32, String)> {
    let template = &state.template;
    if let Some(uri) = params.get("uri").and_then(Value::as_str) {
        if uri != template.uri {
            return Err((INVALID_PARAMS, format!("Unknown resource: {}", uri)));
        }
    }

    let html = state.load_widget_html().await.map_err(|status| {
        tracing::error!("Widget template unavailable: {}", status);
        (INTERNAL_ERROR, "Widget template unavailable".to_string())
    })?;

    Ok(json!({
        "contents": [{
            "uri": template.uri,
            "mimeType": WIDGET_MIME_TYPE,
            "text": html,
            "_meta": template.resource_meta()
        }]
    }))
}

/// Handles `tools/call` request.
///
/// Tool failures come back as `Ok` with `isError: true`; only an unknown
/// tool name is an `Err`.
pub fn handle_tool_call(
    state: &AppState,
    name: &str,
    args: Value,
    call_meta: Option<&Value>,
) -> Result<Value, String> {
    let ctx = CallContext::from_meta(call_meta);
    let (definition, result) = state
        .registry
        .dispatch(state, name, &ctx, &args)
        .ok_or_else(|| format!("Unknown tool: {}", name))?;

    let envelope = match result {
        Ok(mut output) => {
            let widget_id = get_or_create_widget_id(ctx.widget_session_id.as_deref());
            let seed = output.widget_seed.take().unwrap_or_else(|| json!({}));
            let widget_state = state.widgets.render(&widget_id, &ctx.conversation_id, seed);

            let mut meta = state.template.tool_meta(definition, Some(&widget_id));
            meta.insert(META_WIDGET_STATE.into(), widget_state);
            state.composer.compose(output, meta)
        }
        Err(err) => {
            // No template: the host must not render a widget for a failure
            let mut meta = state
                .template
                .tool_meta(definition, ctx.widget_session_id.as_deref());
            meta.remove(META_OUTPUT_TEMPLATE);
            state.composer.fail(name, &err, meta)
        }
    };

    Ok(envelope.into_value())
}
