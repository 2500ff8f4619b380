//! MCP Protocol Helpers
//!
//! JSON-RPC envelopes and widget instance identifiers.

use serde_json::{json, Value};
use uuid::Uuid;

/// Reuses the widget instance a call came from, or starts a new one.
pub fn get_or_create_widget_id(widget_session_id: Option<&str>) -> String {
    widget_session_id
        .map(str::to_string)
        .unwrap_or_else(|| format!("widget_{}", Uuid::new_v4().simple()))
}

/// Builds a JSON-RPC 2.0 success response.
///
/// # Arguments
///
/// * `id` – The request identifier that must be echoed back.
/// * `result` – The payload representing the successful outcome.
pub fn rpc_success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Builds a JSON-RPC 2.0 error response.
///
/// # Arguments
///
/// * `id` – The request identifier (or `null` if unavailable).
/// * `code` – The JSON-RPC error code (e.g., -32601 for method not found).
/// * `message` – Human-readable description of the error.
pub fn rpc_error(id: Value, code: i32, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_id_reuses_host_session() {
        assert_eq!(get_or_create_widget_id(Some("w-7")), "w-7");
        let fresh = get_or_create_widget_id(None);
        assert!(fresh.starts_with("widget_"));
        assert_ne!(fresh, get_or_create_widget_id(None));
    }
}
