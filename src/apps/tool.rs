//! Tool definitions: names, verb roles and annotation flags

use super::csp::WidgetCsp;
use super::schema::InputSchema;
use crate::error::RegistryError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

static TOOL_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^([a-z][a-z0-9]*)",
        r"_(get|list|search|create|update|delete|complete|send)",
        r"_([a-z][a-z0-9]*(?:_[a-z0-9]+)*)$",
    ))
    .expect("tool name pattern is valid")
});

/// The canonical verb roles a tool may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Search,
    Create,
    Update,
    Delete,
    Complete,
    Send,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Search => "search",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Complete => "complete",
            Verb::Send => "send",
        }
    }

    /// Read verbs must never carry a write side effect.
    pub fn is_read(&self) -> bool {
        matches!(self, Verb::Get | Verb::List | Verb::Search)
    }
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Verb::Get),
            "list" => Ok(Verb::List),
            "search" => Ok(Verb::Search),
            "create" => Ok(Verb::Create),
            "update" => Ok(Verb::Update),
            "delete" => Ok(Verb::Delete),
            "complete" => Ok(Verb::Complete),
            "send" => Ok(Verb::Send),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `<service>_<verb>_<noun>` tool name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolName {
    pub service: String,
    pub verb: Verb,
    pub noun: String,
}

impl ToolName {
    pub fn parse(name: &str) -> Result<Self, RegistryError> {
        let caps = TOOL_NAME_PATTERN
            .captures(name)
            .ok_or_else(|| RegistryError::InvalidName(name.to_string()))?;
        let verb = caps[2]
            .parse()
            .map_err(|_| RegistryError::InvalidName(name.to_string()))?;
        Ok(Self {
            service: caps[1].to_string(),
            verb,
            noun: caps[3].to_string(),
        })
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.service, self.verb, self.noun)
    }
}

/// Side-effect hints advertised to the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// No side effects
    pub read_only_hint: bool,
    /// Irreversible removal or modification
    pub destructive_hint: bool,
    /// Touches a system outside the tool's own store
    pub open_world_hint: bool,
}

impl ToolAnnotations {
    pub fn read_only() -> Self {
        Self {
            read_only_hint: true,
            ..Self::default()
        }
    }

    pub fn write() -> Self {
        Self::default()
    }

    pub fn destructive() -> Self {
        Self {
            destructive_hint: true,
            ..Self::default()
        }
    }

    pub fn open_world(mut self) -> Self {
        self.open_world_hint = true;
        self
    }

    /// Checks the flags against the verb role of the tool.
    pub fn check_against(&self, verb: Verb) -> Result<(), String> {
        if self.read_only_hint && self.destructive_hint {
            return Err("readOnlyHint and destructiveHint cannot both be true".to_string());
        }
        if verb.is_read() && !self.read_only_hint {
            return Err(format!("`{}` tools must declare readOnlyHint", verb));
        }
        if !verb.is_read() && self.read_only_hint {
            return Err(format!("`{}` tools have side effects and cannot be read-only", verb));
        }
        if verb == Verb::Delete && !self.destructive_hint {
            return Err("`delete` tools must declare destructiveHint".to_string());
        }
        if verb == Verb::Send && !self.open_world_hint {
            return Err(
                "`send` tools reach outside the service and must declare openWorldHint"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// One callable capability as registered with the server
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub annotations: ToolAnnotations,
    /// Status line shown while the tool runs
    pub invoking: String,
    /// Status line shown once the tool returns
    pub invoked: String,
    /// Per-tool CSP override; the widget template's policy applies otherwise
    pub csp: Option<WidgetCsp>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            name: name.into(),
            invoking: format!("{}…", title),
            invoked: title.clone(),
            title,
            description: String::new(),
            input_schema: InputSchema::new(),
            annotations: ToolAnnotations::default(),
            csp: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn status_text(mut self, invoking: impl Into<String>, invoked: impl Into<String>) -> Self {
        self.invoking = invoking.into();
        self.invoked = invoked.into();
        self
    }

    pub fn csp(mut self, csp: WidgetCsp) -> Self {
        self.csp = Some(csp);
        self
    }

    /// Entry for a `tools/list` response, without the widget `_meta`.
    pub fn listing(&self) -> Value {
        json!({
            "name": self.name,
            "title": self.title,
            "description": self.description,
            "inputSchema": self.input_schema.to_json_schema(),
            "annotations": self.annotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_verb_noun() {
        let name = ToolName::parse("taskflow_list_tasks").unwrap();
        assert_eq!(name.service, "taskflow");
        assert_eq!(name.verb, Verb::List);
        assert_eq!(name.noun, "tasks");
        assert_eq!(name.to_string(), "taskflow_list_tasks");
    }

    #[test]
    fn multi_word_nouns_are_allowed() {
        let name = ToolName::parse("taskflow_send_due_reminder").unwrap();
        assert_eq!(name.verb, Verb::Send);
        assert_eq!(name.noun, "due_reminder");
    }

    #[test]
    fn rejects_non_canonical_verbs_and_shapes() {
        for bad in [
            "taskflow_fetch_tasks",
            "list_tasks",
            "taskflow_list",
            "Taskflow_list_tasks",
            "taskflow_list_Tasks",
            "taskflow__list_tasks",
            "",
        ] {
            assert!(ToolName::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn read_verbs_require_read_only() {
        assert!(ToolAnnotations::write().check_against(Verb::List).is_err());
        assert!(ToolAnnotations::read_only().check_against(Verb::Get).is_ok());
        assert!(ToolAnnotations::read_only().check_against(Verb::Create).is_err());
    }

    #[test]
    fn delete_requires_destructive_and_flags_combine() {
        assert!(ToolAnnotations::write().check_against(Verb::Delete).is_err());
        assert!(ToolAnnotations::destructive().check_against(Verb::Delete).is_ok());
        let both = ToolAnnotations::destructive().open_world();
        assert!(both.destructive_hint && both.open_world_hint);
        assert!(both.check_against(Verb::Delete).is_ok());
    }

    #[test]
    fn send_requires_open_world() {
        assert!(ToolAnnotations::write().check_against(Verb::Send).is_err());
        assert!(ToolAnnotations::write()
            .open_world()
            .check_against(Verb::Send)
            .is_ok());
    }

    #[test]
    fn annotations_serialize_camel_case() {
        let value = serde_json::to_value(ToolAnnotations::destructive()).unwrap();
        assert_eq!(value["destructiveHint"], true);
        assert_eq!(value["readOnlyHint"], false);
        assert_eq!(value["openWorldHint"], false);
    }
}
