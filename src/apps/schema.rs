//! Closed input schemas with strict validation
//!
//! Every parameter carries a description, an optional bound, and (when
//! optional) a default. [`InputSchema::validate`] rejects undeclared fields,
//! reports every issue at once, and fills in defaults so handlers always see
//! the complete parameter set.

use crate::error::{FieldIssue, ValidationError};
use chrono::DateTime;
use serde_json::{json, Map, Value};

/// The shape of a single parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    String { min_length: usize, max_length: usize },
    Integer { minimum: i64, maximum: i64 },
    Boolean,
    Enum { values: Vec<String> },
    /// RFC 3339 date-time string
    Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    fn new(name: impl Into<String>, description: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn string(
        name: impl Into<String>,
        description: impl Into<String>,
        max_length: usize,
    ) -> Self {
        Self::new(
            name,
            description,
            ParamKind::String {
                min_length: 0,
                max_length,
            },
        )
    }

    /// Rejects the empty string. Only meaningful for string parameters.
    pub fn non_empty(mut self) -> Self {
        if let ParamKind::String { min_length, .. } = &mut self.kind {
            *min_length = (*min_length).max(1);
        }
        self
    }

    pub fn integer(
        name: impl Into<String>,
        description: impl Into<String>,
        minimum: i64,
        maximum: i64,
    ) -> Self {
        Self::new(name, description, ParamKind::Integer { minimum, maximum })
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ParamKind::Boolean)
    }

    pub fn enumeration<I, S>(
        name: impl Into<String>,
        description: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            description,
            ParamKind::Enum {
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn timestamp(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ParamKind::Timestamp)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the parameter optional with the given default. `Value::Null` is
    /// an explicit "unset" default.
    pub fn default_value(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = match &self.kind {
            ParamKind::String {
                min_length,
                max_length,
            } => {
                let mut rendered = json!({ "type": "string", "maxLength": max_length });
                if *min_length > 0 {
                    rendered["minLength"] = json!(min_length);
                }
                rendered
            }
            ParamKind::Integer { minimum, maximum } => {
                json!({ "type": "integer", "minimum": minimum, "maximum": maximum })
            }
            ParamKind::Boolean => json!({ "type": "boolean" }),
            ParamKind::Enum { values } => json!({ "type": "string", "enum": values }),
            ParamKind::Timestamp => json!({ "type": "string", "format": "date-time" }),
        };
        schema["description"] = json!(self.description);
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
            if default.is_null() {
                // Nullable so the advertised default is itself valid.
                let ty = schema["type"].clone();
                schema["type"] = json!([ty, "null"]);
            }
        }
        schema
    }

    fn check(&self, value: &Value) -> Option<FieldIssue> {
        let field = self.name.clone();
        match &self.kind {
            ParamKind::String {
                min_length,
                max_length,
            } => match value.as_str() {
                None => Some(FieldIssue::InvalidType { field, expected: "a string" }),
                Some(s) if s.trim().chars().count() < *min_length => Some(FieldIssue::TooShort {
                    field,
                    min: *min_length,
                }),
                Some(s) if s.chars().count() > *max_length => Some(FieldIssue::TooLong {
                    field,
                    max: *max_length,
                }),
                Some(_) => None,
            },
            ParamKind::Integer { minimum, maximum } => match value.as_i64() {
                None => Some(FieldIssue::InvalidType { field, expected: "an integer" }),
                Some(n) if n < *minimum || n > *maximum => Some(FieldIssue::OutOfRange {
                    field,
                    min: *minimum,
                    max: *maximum,
                }),
                Some(_) => None,
            },
            ParamKind::Boolean => {
                if value.is_boolean() {
                    None
                } else {
                    Some(FieldIssue::InvalidType { field, expected: "a boolean" })
                }
            }
            ParamKind::Enum { values } => match value.as_str() {
                Some(s) if values.iter().any(|v| v == s) => None,
                _ => Some(FieldIssue::NotAllowed {
                    field,
                    allowed: values.clone(),
                }),
            },
            ParamKind::Timestamp => match value.as_str() {
                Some(s) if DateTime::parse_from_rfc3339(s).is_ok() => None,
                _ => Some(FieldIssue::InvalidType {
                    field,
                    expected: "an RFC 3339 timestamp",
                }),
            },
        }
    }
}

/// A strictly closed parameter object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Design checks run at registration time.
    pub fn lint(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (i, p) in self.params.iter().enumerate() {
            if p.description.trim().is_empty() {
                problems.push(format!("parameter `{}` has no description", p.name));
            }
            if !p.required && p.default.is_none() {
                problems.push(format!("optional parameter `{}` has no default", p.name));
            }
            if self.params[..i].iter().any(|q| q.name == p.name) {
                problems.push(format!("parameter `{}` is declared twice", p.name));
            }
            match &p.kind {
                ParamKind::Integer { minimum, maximum } if minimum > maximum => {
                    problems.push(format!("parameter `{}` has an empty range", p.name));
                }
                ParamKind::String {
                    min_length,
                    max_length,
                } if min_length > max_length => {
                    problems.push(format!("parameter `{}` has an empty range", p.name));
                }
                ParamKind::Enum { values } if values.is_empty() => {
                    problems.push(format!("parameter `{}` allows no values", p.name));
                }
                _ => {}
            }
            if let Some(default) = p.default.as_ref().filter(|d| !d.is_null()) {
                if p.check(default).is_some() {
                    problems.push(format!("default for `{}` violates its own constraint", p.name));
                }
            }
        }
        problems
    }

    /// Validates `args` and returns the complete argument object with
    /// defaults applied. `null` arguments are treated as an empty object, and
    /// an explicit `null` for an optional field means "use the default".
    pub fn validate(&self, args: &Value) -> Result<Map<String, Value>, ValidationError> {
        let empty = Map::new();
        let provided = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => return Err(ValidationError::single(FieldIssue::NotAnObject)),
        };

        let mut issues: Vec<FieldIssue> = provided
            .keys()
            .filter(|key| !self.params.iter().any(|p| &p.name == *key))
            .map(|key| FieldIssue::Unexpected { field: key.clone() })
            .collect();

        let mut resolved = Map::new();
        for spec in &self.params {
            match provided.get(&spec.name) {
                Some(Value::Null) | None if spec.required => {
                    issues.push(FieldIssue::Missing {
                        field: spec.name.clone(),
                    });
                }
                Some(Value::Null) | None => {
                    let default = spec.default.clone().unwrap_or(Value::Null);
                    resolved.insert(spec.name.clone(), default);
                }
                Some(value) => match spec.check(value) {
                    Some(issue) => issues.push(issue),
                    None => {
                        resolved.insert(spec.name.clone(), value.clone());
                    }
                },
            }
        }

        if issues.is_empty() {
            Ok(resolved)
        } else {
            Err(ValidationError::new(issues))
        }
    }
}
