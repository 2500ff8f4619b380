//! Three-layer tool responses
//!
//! A result reaches two audiences. The model reads `content` (narration) and
//! `structuredContent`; only the rendering widget reads `_meta`. Handlers
//! return a [`ToolOutput`] and the [`ResponseComposer`] turns it, or a
//! [`ToolError`], into the [`ResponseEnvelope`] sent back over MCP.

use crate::error::ToolError;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// What a handler produces on success
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub narration: String,
    pub structured: Value,
    pub meta: Map<String, Value>,
    /// Initial widget state for a first render
    pub widget_seed: Option<Value>,
}

impl ToolOutput {
    pub fn new(narration: impl Into<String>, structured: Value) -> Self {
        Self {
            narration: narration.into(),
            structured,
            meta: Map::new(),
            widget_seed: None,
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn with_widget_seed(mut self, seed: Value) -> Self {
        self.widget_seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// The MCP `tools/call` result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub content: Vec<TextContent>,
    pub structured_content: Value,
    #[serde(rename = "_meta")]
    pub meta: Map<String, Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ResponseEnvelope {
    pub fn narration(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize response envelope: {}", e);
            json!({
                "content": [{
                    "type": "text",
                    "text": "The server could not encode this result. Try the call again."
                }],
                "structuredContent": {
                    "error": true,
                    "category": "internal",
                    "message": "encoding failed"
                },
                "isError": true
            })
        })
    }
}

pub struct ResponseComposer {
    narration_max_chars: usize,
    /// Tool the model should call to recover from stale references
    recovery_tool: String,
}

impl ResponseComposer {
    pub fn new(narration_max_chars: usize, recovery_tool: impl Into<String>) -> Self {
        Self {
            narration_max_chars,
            recovery_tool: recovery_tool.into(),
        }
    }

    /// Builds a success envelope. `widget_meta` is merged under the handler's
    /// own `_meta` entries.
    pub fn compose(&self, output: ToolOutput, widget_meta: Map<String, Value>) -> ResponseEnvelope {
        let mut meta = widget_meta;
        meta.extend(output.meta);
        ResponseEnvelope {
            content: vec![self.text(output.narration)],
            structured_content: output.structured,
            meta,
            is_error: false,
        }
    }

    /// Builds a failure envelope with an actionable narration and a
    /// machine-checkable error indicator.
    pub fn fail(
        &self,
        tool_name: &str,
        error: &ToolError,
        widget_meta: Map<String, Value>,
    ) -> ResponseEnvelope {
        let mut structured = json!({
            "error": true,
            "category": error.category(),
            "message": error.to_string(),
        });
        if let Some(secs) = error.retry_after_secs() {
            structured["retryAfterSeconds"] = json!(secs);
        }
        if let ToolError::Validation(v) = error {
            let fields: Vec<&str> = v.issues.iter().filter_map(|i| i.field()).collect();
            structured["fields"] = json!(fields);
        }
        ResponseEnvelope {
            content: vec![self.text(error.narration(tool_name, &self.recovery_tool))],
            structured_content: structured,
            meta: widget_meta,
            is_error: true,
        }
    }

    fn text(&self, narration: String) -> TextContent {
        TextContent {
            kind: "text",
            text: bound_narration(narration, self.narration_max_chars),
        }
    }
}

/// Truncates on a character boundary, ending with an ellipsis when cut.
pub fn bound_narration(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let keep = max_chars.saturating_sub(1);
    let mut cut: String = text.chars().take(keep).collect();
    cut.push('…');
    cut
}
