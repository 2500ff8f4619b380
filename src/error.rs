//! Error types for the Taskflow server
//!
//! Tool failures are part of the response contract: every [`ToolError`]
//! knows its machine-readable category and how to phrase itself as an
//! actionable sentence for the model.

use std::fmt;

/// A single problem found while validating tool arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    /// The argument object carried a field the schema does not declare
    Unexpected { field: String },
    /// A required field was absent
    Missing { field: String },
    /// The value had the wrong JSON type
    InvalidType { field: String, expected: &'static str },
    /// A numeric value fell outside its bounds
    OutOfRange { field: String, min: i64, max: i64 },
    /// A string value was empty or shorter than allowed
    TooShort { field: String, min: usize },
    /// A string value was longer than allowed
    TooLong { field: String, max: usize },
    /// An enumerated value was not one of the allowed options
    NotAllowed { field: String, allowed: Vec<String> },
    /// The arguments were not a JSON object at all
    NotAnObject,
}

impl FieldIssue {
    pub fn field(&self) -> Option<&str> {
        match self {
            FieldIssue::Unexpected { field }
            | FieldIssue::Missing { field }
            | FieldIssue::InvalidType { field, .. }
            | FieldIssue::OutOfRange { field, .. }
            | FieldIssue::TooShort { field, .. }
            | FieldIssue::TooLong { field, .. }
            | FieldIssue::NotAllowed { field, .. } => Some(field),
            FieldIssue::NotAnObject => None,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Unexpected { field } => write!(f, "unexpected field `{}`", field),
            FieldIssue::Missing { field } => write!(f, "missing required field `{}`", field),
            FieldIssue::InvalidType { field, expected } => {
                write!(f, "field `{}` must be {}", field, expected)
            }
            FieldIssue::OutOfRange { field, min, max } => {
                write!(f, "field `{}` must be between {} and {}", field, min, max)
            }
            FieldIssue::TooShort { field, min } => {
                write!(f, "field `{}` must have at least {} non-blank characters", field, min)
            }
            FieldIssue::TooLong { field, max } => {
                write!(f, "field `{}` must be at most {} characters", field, max)
            }
            FieldIssue::NotAllowed { field, allowed } => {
                write!(f, "field `{}` must be one of {}", field, allowed.join(", "))
            }
            FieldIssue::NotAnObject => write!(f, "arguments must be a JSON object"),
        }
    }
}

/// Strict-mode validation failure. Carries every issue found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid arguments: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    pub fn single(issue: FieldIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure of a single tool invocation
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// Referenced entity no longer exists
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },

    /// Caller must back off before retrying
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Caller lacks access to the entity
    #[error("permission denied")]
    PermissionDenied,

    /// Input rejected by the schema
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Anything the caller cannot act on
    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ToolError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable category code placed in structured content.
    pub fn category(&self) -> &'static str {
        match self {
            ToolError::NotFound { .. } => "not_found",
            ToolError::RateLimited { .. } => "rate_limited",
            ToolError::PermissionDenied => "permission_denied",
            ToolError::Validation(_) => "validation",
            ToolError::Internal(_) => "internal",
        }
    }

    /// Actionable sentence for the narration channel.
    ///
    /// `recovery_tool` names the tool the model should call to recover from a
    /// stale reference (typically the service's list tool).
    pub fn narration(&self, tool_name: &str, recovery_tool: &str) -> String {
        match self {
            ToolError::NotFound { entity, id } => format!(
                "The {} `{}` no longer exists. Call {} to refresh the list and pick a current {}.",
                entity, id, recovery_tool, entity
            ),
            ToolError::RateLimited { retry_after_secs } => format!(
                "{} is rate limited. Wait {} seconds before calling it again.",
                tool_name, retry_after_secs
            ),
            ToolError::PermissionDenied => format!(
                "You do not have access to this item, so {} was not performed. \
                 Ask its owner to share it or choose another item.",
                tool_name
            ),
            ToolError::Validation(err) => format!(
                "{} rejected the request: {}. \
                 Fix the arguments and call it again with only the declared fields.",
                tool_name,
                join_issues(&err.issues)
            ),
            ToolError::Internal(_) => format!(
                "{} could not finish because the server hit an internal problem. \
                 Try the same call again in a moment.",
                tool_name
            ),
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ToolError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Internal(err.to_string())
    }
}

/// Rejections raised while building the active tool set
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool `{0}` is already registered")]
    DuplicateName(String),

    #[error("tool name `{0}` does not match <service>_<verb>_<noun> with a canonical verb")]
    InvalidName(String),

    #[error("tool `{name}` must be prefixed with service `{expected}`")]
    ServicePrefix { name: String, expected: String },

    #[error("tool `{name}` has conflicting annotations: {reason}")]
    AnnotationConflict { name: String, reason: String },

    #[error("tool `{name}` has an unusable description: {reason}")]
    Description { name: String, reason: String },

    #[error("tool `{name}` has schema problems: {}", .problems.join("; "))]
    Schema { name: String, problems: Vec<String> },

    #[error("tool `{name}` declares a disallowed CSP entry: {}", .problems.join("; "))]
    Csp { name: String, problems: Vec<String> },
}

/// Failures on the widget-state persistence channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidgetStateError {
    #[error("widget `{0}` has not been rendered")]
    NotRendered(String),
}

/// Configuration errors surfaced at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}
