//! Widget template and the `openai/*` metadata keys the host reads

use super::csp::WidgetCsp;
use super::tool::ToolDefinition;
use serde_json::{json, Map, Value};

pub const META_OUTPUT_TEMPLATE: &str = "openai/outputTemplate";
pub const META_INVOKING: &str = "openai/toolInvocation/invoking";
pub const META_INVOKED: &str = "openai/toolInvocation/invoked";
pub const META_WIDGET_ACCESSIBLE: &str = "openai/widgetAccessible";
pub const META_WIDGET_SESSION_ID: &str = "openai/widgetSessionId";
pub const META_WIDGET_CSP: &str = "openai/widgetCSP";
pub const META_WIDGET_DESCRIPTION: &str = "openai/widgetDescription";
pub const META_WIDGET_PREFERS_BORDER: &str = "openai/widgetPrefersBorder";
/// Caller identity supplied by the host on `tools/call`
pub const META_SUBJECT: &str = "openai/subject";
pub const META_CONVERSATION_ID: &str = "openai/conversationId";
/// Key under which the current widget state travels in `_meta`
pub const META_WIDGET_STATE: &str = "widgetState";

/// MIME type for Apps SDK widget HTML
pub const WIDGET_MIME_TYPE: &str = "text/html+skybridge";

/// The HTML resource a tool result renders into
#[derive(Debug, Clone)]
pub struct WidgetTemplate {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub csp: WidgetCsp,
    pub prefers_border: bool,
}

impl WidgetTemplate {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: String::new(),
            csp: WidgetCsp::default(),
            prefers_border: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn csp(mut self, csp: WidgetCsp) -> Self {
        self.csp = csp;
        self
    }

    /// Metadata attached to the resource in `resources/list` and `resources/read`.
    pub fn resource_meta(&self) -> Value {
        json!({
            META_WIDGET_DESCRIPTION: self.description,
            META_WIDGET_PREFERS_BORDER: self.prefers_border,
            META_WIDGET_CSP: self.csp,
        })
    }

    /// Metadata attached to a tool, both in `tools/list` and on each result.
    ///
    /// `session_id` links the result to a specific widget instance.
    pub fn tool_meta(&self, tool: &ToolDefinition, session_id: Option<&str>) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert(META_OUTPUT_TEMPLATE.into(), json!(self.uri));
        meta.insert(META_INVOKING.into(), json!(tool.invoking));
        meta.insert(META_INVOKED.into(), json!(tool.invoked));
        meta.insert(META_WIDGET_ACCESSIBLE.into(), json!(true));
        if let Some(csp) = &tool.csp {
            meta.insert(META_WIDGET_CSP.into(), json!(csp));
        }
        if let Some(id) = session_id {
            meta.insert(META_WIDGET_SESSION_ID.into(), json!(id));
        }
        meta
    }
}
