//! Integration tests for the Taskflow MCP server
//!
//! These tests drive the full router and cover:
//! - Server initialization and handshake
//! - Tool discovery, annotations and schemas
//! - Resource discovery and reading
//! - Three-layer tool results and error envelopes
//! - Protocol-level errors

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use taskflow_rust::router::create_app_router;
use taskflow_rust::tasks::AppState;

/// Helper function to create a test app instance
fn create_test_app() -> axum::Router {
    let state = Arc::new(AppState::new());
    create_app_router(state)
}

/// Helper function to send a JSON-RPC request and get the response
async fn send_jsonrpc_request(
    app: &axum::Router,
    method: &str,
    params: Option<Value>,
    id: i32,
) -> (StatusCode, Value) {
    let request_body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id
    });

    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&request_body).unwrap()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

/// Calls a tool and returns the JSON-RPC `result`.
async fn call_tool(app: &axum::Router, name: &str, arguments: Value, id: i32) -> Value {
    let params = json!({ "name": name, "arguments": arguments });
    let (status, body) = send_jsonrpc_request(app, "tools/call", Some(params), id).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("error").is_none(), "unexpected rpc error: {}", body);
    body["result"].clone()
}

fn find_tool<'a>(tools: &'a [Value], name: &str) -> &'a Value {
    tools
        .iter()
        .find(|t| t["name"] == name)
        .unwrap_or_else(|| panic!("tool {} not listed", name))
}

#[tokio::test]
async fn test_mcp_sse_endpoint() {
    let app = create_test_app();

    let request = Request::builder()
        .method("GET")
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(content_type, "text/event-stream");

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_str = String::from_utf8(body_bytes.to_vec()).unwrap();
    assert!(body_str.contains("event: endpoint"));
    assert!(body_str.contains("data: /mcp"));
}

#[tokio::test]
async fn test_mcp_initialize() {
    let app = create_test_app();

    let (status, body) = send_jsonrpc_request(&app, "initialize", None, 1).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);

    let result = &body["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "taskflow-rust");
    assert!(result["capabilities"]["tools"]["listChanged"]
        .as_bool()
        .unwrap());
}

#[tokio::test]
async fn test_mcp_tools_list_annotations() {
    let app = create_test_app();

    let (status, body) = send_jsonrpc_request(&app, "tools/list", None, 2).await;
    assert_eq!(status, StatusCode::OK);

    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 8);

    let delete = find_tool(tools, "taskflow_delete_task");
    assert_eq!(delete["annotations"]["destructiveHint"], true);
    assert_eq!(delete["annotations"]["readOnlyHint"], false);

    let list = find_tool(tools, "taskflow_list_tasks");
    assert_eq!(list["annotations"]["readOnlyHint"], true);
    assert_eq!(list["annotations"]["destructiveHint"], false);

    let send = find_tool(tools, "taskflow_send_reminder");
    assert_eq!(send["annotations"]["openWorldHint"], true);

    for tool in tools {
        assert!(tool["description"]
            .as_str()
            .unwrap()
            .contains("Use this when"));
        assert_eq!(tool["inputSchema"]["additionalProperties"], false);
        assert_eq!(tool["_meta"]["openai/outputTemplate"], "ui://widget/taskflow.html");
    }
}

#[tokio::test]
async fn test_mcp_tools_list_schema_defaults() {
    let app = create_test_app();

    let (_, body) = send_jsonrpc_request(&app, "tools/list", None, 3).await;
    let tools = body["result"]["tools"].as_array().unwrap();
    let list = find_tool(tools, "taskflow_list_tasks");

    let props = &list["inputSchema"]["properties"];
    assert_eq!(props["limit"]["default"], 10);
    assert_eq!(props["limit"]["maximum"], 50);
    assert_eq!(props["status"]["default"], "all");
    assert_eq!(props["cursor"]["type"], json!(["string", "null"]));
    assert_eq!(list["inputSchema"]["required"], json!([]));

    let get = find_tool(tools, "taskflow_get_task");
    assert_eq!(get["inputSchema"]["required"], json!(["taskId"]));
}

#[tokio::test]
async fn test_mcp_resources_list() {
    let app = create_test_app();

    let (status, body) = send_jsonrpc_request(&app, "resources/list", None, 4).await;
    assert_eq!(status, StatusCode::OK);

    let resources = body["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);

    let widget = &resources[0];
    assert_eq!(widget["uri"], "ui://widget/taskflow.html");
    assert_eq!(widget["mimeType"], "text/html+skybridge");
    assert!(widget["_meta"]["openai/widgetCSP"].is_object());
}

#[tokio::test]
async fn test_mcp_resources_read() {
    let app = create_test_app();

    let params = json!({ "uri": "ui://widget/taskflow.html" });
    let (status, body) = send_jsonrpc_request(&app, "resources/read", Some(params), 5).await;
    assert_eq!(status, StatusCode::OK);

    let contents = body["result"]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);

    let content = &contents[0];
    assert_eq!(content["uri"], "ui://widget/taskflow.html");
    assert_eq!(content["mimeType"], "text/html+skybridge");
    assert!(content["text"].as_str().unwrap().contains("<html"));
}

#[tokio::test]
async fn test_mcp_resources_read_unknown_uri() {
    let app = create_test_app();

    let params = json!({ "uri": "ui://widget/other.html" });
    let (_, body) = send_jsonrpc_request(&app, "resources/read", Some(params), 6).await;
    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn test_list_result_has_three_layers() {
    let app = create_test_app();

    call_tool(
        &app,
        "taskflow_create_task",
        json!({
            "title": "File taxes",
            "description": "Gather receipts first",
            "due": "2030-04-15T00:00:00Z"
        }),
        7,
    )
    .await;

    let result = call_tool(&app, "taskflow_list_tasks", json!({}), 8).await;

    let content = &result["content"][0];
    assert_eq!(content["type"], "text");
    assert!(content["text"].as_str().unwrap().contains("File taxes"));

    let structured = &result["structuredContent"];
    assert_eq!(structured["total"], 1);
    let first = structured["tasks"][0].as_object().unwrap();
    assert!(!first.contains_key("description"));
    assert!(structured.get("nextCursor").is_none());

    let meta = &result["_meta"];
    assert_eq!(meta["tasks"][0]["description"], "Gather receipts first");
    assert!(meta["nextCursor"].is_null());
    assert_eq!(meta["preferences"]["status"], "all");
    assert!(meta["openai/widgetSessionId"].is_string());
    assert!(result.get("isError").is_none());
}

#[tokio::test]
async fn test_unknown_argument_is_rejected() {
    let app = create_test_app();

    let result = call_tool(&app, "taskflow_list_tasks", json!({ "foo": 1 }), 9).await;

    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"], true);
    assert_eq!(result["structuredContent"]["category"], "validation");
    assert_eq!(result["structuredContent"]["fields"], json!(["foo"]));
    assert!(result["content"][0]["text"].as_str().unwrap().contains("foo"));
}

#[tokio::test]
async fn test_missing_required_field_is_validation_error() {
    let app = create_test_app();

    let args = json!({ "description": "no title" });
    let result = call_tool(&app, "taskflow_create_task", args, 10).await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["category"], "validation");
    assert_eq!(result["structuredContent"]["fields"], json!(["title"]));

    let explicit_null = call_tool(&app, "taskflow_create_task", json!({ "title": null }), 11).await;
    assert_eq!(explicit_null["isError"], true);
}

#[tokio::test]
async fn test_blank_title_is_validation_error() {
    let app = create_test_app();

    let result = call_tool(&app, "taskflow_create_task", json!({ "title": "" }), 20).await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["category"], "validation");
    assert_eq!(result["structuredContent"]["fields"], json!(["title"]));
    assert!(result["_meta"].get("openai/outputTemplate").is_none());

    let listed = call_tool(&app, "taskflow_list_tasks", json!({}), 21).await;
    assert_eq!(listed["structuredContent"]["total"], 0);

    let (_, body) = send_jsonrpc_request(&app, "tools/list", None, 22).await;
    let tools = body["result"]["tools"].as_array().unwrap();
    let create = find_tool(tools, "taskflow_create_task");
    assert_eq!(create["inputSchema"]["properties"]["title"]["minLength"], 1);
}

#[tokio::test]
async fn test_null_optional_takes_default() {
    let app = create_test_app();

    let args = json!({ "limit": null, "status": null });
    let result = call_tool(&app, "taskflow_list_tasks", args, 12).await;
    assert!(result.get("isError").is_none());
    assert_eq!(result["_meta"]["preferences"]["status"], "all");
}

#[tokio::test]
async fn test_stale_reference_names_recovery_tool() {
    let app = create_test_app();

    let result = call_tool(&app, "taskflow_get_task", json!({ "taskId": "task_gone" }), 13).await;

    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["category"], "not_found");
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("taskflow_list_tasks"));
}

#[tokio::test]
async fn test_reminder_rate_limit_reports_retry_after() {
    let app = create_test_app();

    let created = call_tool(&app, "taskflow_create_task", json!({ "title": "Dentist" }), 14).await;
    let task_id = created["structuredContent"]["id"].as_str().unwrap().to_string();

    let first = call_tool(&app, "taskflow_send_reminder", json!({ "taskId": task_id }), 15).await;
    assert!(first.get("isError").is_none());
    assert!(first["_meta"]["deliveryId"].is_string());

    let second = call_tool(&app, "taskflow_send_reminder", json!({ "taskId": task_id }), 16).await;
    assert_eq!(second["isError"], true);
    assert_eq!(second["structuredContent"]["category"], "rate_limited");
    assert!(second["structuredContent"]["retryAfterSeconds"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_owner_scoped_tasks() {
    let app = create_test_app();

    let params = json!({
        "name": "taskflow_create_task",
        "arguments": { "title": "Private plan" },
        "_meta": { "openai/subject": "alice" }
    });
    let (_, body) = send_jsonrpc_request(&app, "tools/call", Some(params), 17).await;
    let task_id = body["result"]["structuredContent"]["id"].as_str().unwrap().to_string();

    let params = json!({
        "name": "taskflow_get_task",
        "arguments": { "taskId": task_id },
        "_meta": { "openai/subject": "bob" }
    });
    let (_, body) = send_jsonrpc_request(&app, "tools/call", Some(params), 18).await;
    let result = &body["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["category"], "permission_denied");
    assert!(!result["content"][0]["text"].as_str().unwrap().contains("alice"));
}

#[tokio::test]
async fn test_mcp_unknown_method() {
    let app = create_test_app();

    let (status, body) = send_jsonrpc_request(&app, "unknown/method", None, 19).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 19);
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["error"]["message"], "Method not found");
}

#[tokio::test]
async fn test_mcp_invalid_json() {
    let app = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from("invalid json {{{"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap();

    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["error"]["message"], "Parse error");
}

#[tokio::test]
async fn test_mcp_tool_call_unknown_tool() {
    let app = create_test_app();

    let params = json!({ "name": "unknown_tool", "arguments": {} });
    let (status, body) = send_jsonrpc_request(&app, "tools/call", Some(params), 20).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32602);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Unknown tool"));
}

#[tokio::test]
async fn test_mcp_ping() {
    let app = create_test_app();

    let (status, body) = send_jsonrpc_request(&app, "ping", None, 21).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!({}));
}
