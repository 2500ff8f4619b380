//! Tool registry and request dispatch
//!
//! The registry is the single place where a tool enters the active set, so
//! every naming, annotation, description, schema and CSP rule is checked in
//! [`ToolRegistry::register`]. Dispatch validates arguments strictly before
//! a handler ever sees them.

use super::response::ToolOutput;
use super::tool::{ToolDefinition, ToolName};
use super::widget::{META_CONVERSATION_ID, META_SUBJECT, META_WIDGET_SESSION_ID};
use crate::error::{RegistryError, ToolError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

const DESCRIPTION_MAX_CHARS: usize = 1024;

static MARKETING_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(best|amazing|awesome|powerful|revolutionary|seamless(ly)?",
        r"|world-class|ultimate|cutting-edge|blazing)\b",
    ))
    .expect("marketing pattern is valid")
});

static IMPLEMENTATION_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(sql|database|dashmap|endpoint|stack trace|api key)\b")
        .expect("implementation pattern is valid")
});

/// Per-call facts supplied by the host in the `tools/call` `_meta`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Opaque caller identity
    pub subject: Option<String>,
    pub conversation_id: String,
    /// Present when the call originates from controls in an existing widget
    pub widget_session_id: Option<String>,
}

impl CallContext {
    pub const DEFAULT_CONVERSATION: &'static str = "default";

    pub fn from_meta(meta: Option<&Value>) -> Self {
        let get = |key: &str| {
            meta.and_then(|m| m.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            subject: get(META_SUBJECT),
            conversation_id: get(META_CONVERSATION_ID)
                .unwrap_or_else(|| Self::DEFAULT_CONVERSATION.to_string()),
            widget_session_id: get(META_WIDGET_SESSION_ID),
        }
    }
}

/// Handler invoked with validated, default-filled arguments
pub type ToolHandler<S> =
    fn(&S, &CallContext, Map<String, Value>) -> Result<ToolOutput, ToolError>;

pub struct RegisteredTool<S> {
    pub definition: ToolDefinition,
    pub name: ToolName,
    handler: ToolHandler<S>,
}

impl<S> RegisteredTool<S> {
    pub fn invoke(
        &self,
        state: &S,
        ctx: &CallContext,
        args: &Value,
    ) -> Result<ToolOutput, ToolError> {
        let validated = self.definition.input_schema.validate(args)?;
        (self.handler)(state, ctx, validated)
    }
}

pub struct ToolRegistry<S> {
    service: String,
    tools: Vec<RegisteredTool<S>>,
}

impl<S> ToolRegistry<S> {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tools: Vec::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Adds a tool to the active set after checking every registration rule.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: ToolHandler<S>,
    ) -> Result<(), RegistryError> {
        let name = ToolName::parse(&definition.name)?;
        if name.service != self.service {
            return Err(RegistryError::ServicePrefix {
                name: definition.name.clone(),
                expected: self.service.clone(),
            });
        }
        if self.get(&definition.name).is_some() {
            return Err(RegistryError::DuplicateName(definition.name.clone()));
        }

        definition
            .annotations
            .check_against(name.verb)
            .map_err(|reason| RegistryError::AnnotationConflict {
                name: definition.name.clone(),
                reason,
            })?;

        check_description(&definition.description).map_err(|reason| RegistryError::Description {
            name: definition.name.clone(),
            reason,
        })?;

        let problems = definition.input_schema.lint();
        if !problems.is_empty() {
            return Err(RegistryError::Schema {
                name: definition.name.clone(),
                problems,
            });
        }

        if let Some(csp) = &definition.csp {
            let findings = csp.lint();
            let violations: Vec<String> = findings
                .iter()
                .filter(|f| f.severity == super::csp::Severity::Violation)
                .map(ToString::to_string)
                .collect();
            if !violations.is_empty() {
                return Err(RegistryError::Csp {
                    name: definition.name.clone(),
                    problems: violations,
                });
            }
            for finding in findings {
                tracing::warn!(tool = %definition.name, "CSP review: {}", finding);
            }
        }

        tracing::debug!(tool = %definition.name, verb = %name.verb, "Registered tool");
        self.tools.push(RegisteredTool {
            definition,
            name,
            handler,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool<S>> {
        self.tools.iter().find(|t| t.definition.name == name)
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| &t.definition)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validates and runs a tool, returning its definition alongside the
    /// outcome. `None` means no such tool is registered.
    pub fn dispatch(
        &self,
        state: &S,
        name: &str,
        ctx: &CallContext,
        args: &Value,
    ) -> Option<(&ToolDefinition, Result<ToolOutput, ToolError>)> {
        let tool = self.get(name)?;
        let result = tool.invoke(state, ctx, args);
        match &result {
            Ok(_) => tracing::info!(tool = name, "Tool call succeeded"),
            Err(e) => {
                tracing::info!(tool = name, category = e.category(), "Tool call failed: {}", e)
            }
        }
        Some((&tool.definition, result))
    }
}

fn check_description(description: &str) -> Result<(), String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err("description is empty".to_string());
    }
    if trimmed.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!("description is longer than {} characters", DESCRIPTION_MAX_CHARS));
    }
    if !trimmed.to_lowercase().contains("use this when") {
        return Err(
            "description must state when to use the tool (\"Use this when ...\")".to_string(),
        );
    }
    if let Some(m) = MARKETING_WORDS.find(trimmed) {
        return Err(format!("marketing language `{}`", m.as_str()));
    }
    if let Some(m) = IMPLEMENTATION_WORDS.find(trimmed) {
        return Err(format!("implementation detail `{}`", m.as_str()));
    }
    Ok(())
}
