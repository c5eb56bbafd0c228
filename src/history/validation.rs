//! Input validation for actions
//!
//! A validator is consulted by `create_action` before an action is handed
//! out. Document models describe their action inputs with an
//! [`InputSchema`]; anything else can implement [`InputValidator`] directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::InputError;

/// A single schema violation found in an action input
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Field path inside the input, empty for the input itself
    pub path: Vec<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn at(mut self, field: impl Into<String>) -> Self {
        self.path.push(field.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

/// Checks an action input before the action is created
pub trait InputValidator {
    fn validate(&self, input: &Value) -> Result<(), InputError>;
}

impl<F> InputValidator for F
where
    F: Fn(&Value) -> Result<(), InputError>,
{
    fn validate(&self, input: &Value) -> Result<(), InputError> {
        self(input)
    }
}

/// JSON kind expected for a field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Array,
    Object,
    Any,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Any => true,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Any => "any",
        }
    }
}

/// Specification for one field of an object input
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Object-shaped input schema.
///
/// Unknown fields are allowed. `null` counts as absent for optional fields.
#[derive(Clone, Debug, Default)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Collect every violation instead of stopping at the first
    pub fn issues(&self, input: &Value) -> Vec<ValidationIssue> {
        let Some(object) = input.as_object() else {
            return vec![ValidationIssue::new(format!(
                "expected object, received {}",
                kind_of(input)
            ))];
        };

        let mut issues = Vec::new();
        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    issues.push(ValidationIssue::new("required").at(&field.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.kind.matches(value) => {
                    issues.push(
                        ValidationIssue::new(format!(
                            "expected {}, received {}",
                            field.kind.name(),
                            kind_of(value)
                        ))
                        .at(&field.name),
                    );
                }
                Some(_) => {}
            }
        }
        issues
    }
}

impl InputValidator for InputSchema {
    fn validate(&self, input: &Value) -> Result<(), InputError> {
        let issues = self.issues(input);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(InputError::Schema(issues))
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
