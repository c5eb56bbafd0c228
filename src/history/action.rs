//! Actions: intents to mutate a document, not yet positioned in history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::scope::Scope;
use super::validation::InputValidator;
use crate::error::{DocumentError, InputError, Result};
use crate::signing::ActionSigner;

pub const SET_NAME: &str = "SET_NAME";
pub const UNDO: &str = "UNDO";
pub const REDO: &str = "REDO";
pub const PRUNE: &str = "PRUNE";
pub const LOAD_STATE: &str = "LOAD_STATE";
pub const NOOP: &str = "NOOP";

/// Action types handled by the document engine itself rather than by a
/// document model's reducer
pub fn is_control_type(action_type: &str) -> bool {
    matches!(
        action_type,
        SET_NAME | UNDO | REDO | PRUNE | LOAD_STATE | NOOP
    )
}

/// Binary payload stored alongside a document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Base64-encoded content
    pub data: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Attachment carried by an action, keyed by its content hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    pub hash: String,
    #[serde(flatten)]
    pub attachment: Attachment,
}

impl AttachmentInput {
    /// Reference under which the attachment is indexed in a document
    pub fn reference(&self) -> String {
        attachment_ref(&self.hash)
    }
}

pub fn attachment_ref(hash: &str) -> String {
    format!("attachment://{}", hash)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_op_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_op_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<ActionSigner>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub timestamp_utc_ms: DateTime<Utc>,
    #[serde(default)]
    pub input: Value,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ActionContext>,
}

impl Action {
    /// Shorthand for an unvalidated, attachment-free action
    pub fn new(action_type: impl Into<String>, input: Value, scope: Scope) -> Result<Self> {
        create_action(action_type, input, Vec::new(), None, scope)
    }

    fn control(action_type: &str, input: Value, scope: Scope) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_type: action_type.to_string(),
            timestamp_utc_ms: Utc::now(),
            input,
            scope,
            attachments: Vec::new(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: ActionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_control(&self) -> bool {
        is_control_type(&self.action_type)
    }

    /// Signer attached to the action, if any
    pub fn signer(&self) -> Option<&ActionSigner> {
        self.context.as_ref().and_then(|c| c.signer.as_ref())
    }

    /// Decode the input into a typed payload
    pub fn parse_input<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.input.clone()).map_err(|e| {
            DocumentError::InvalidActionInput(InputError::Opaque(format!(
                "{} input: {}",
                self.action_type, e
            )))
        })
    }
}

/// Build an action.
///
/// Fails with `InvalidActionType` for an empty type, and with
/// `InvalidActionInput` when a validator rejects the input.
pub fn create_action(
    action_type: impl Into<String>,
    input: Value,
    attachments: Vec<AttachmentInput>,
    validator: Option<&dyn InputValidator>,
    scope: Scope,
) -> Result<Action> {
    let action_type = action_type.into();
    if action_type.trim().is_empty() {
        return Err(DocumentError::InvalidActionType(action_type));
    }

    if let Some(validator) = validator {
        validator.validate(&input)?;
    }

    Ok(Action {
        id: Uuid::new_v4().to_string(),
        action_type,
        timestamp_utc_ms: Utc::now(),
        input,
        scope,
        attachments,
        context: None,
    })
}

/// Input of PRUNE
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

/// Net effect of a pruned range: the document name plus every scope's state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadStatePayload {
    pub name: String,
    pub global: Value,
    pub local: Value,
}

impl LoadStatePayload {
    pub fn scope(&self, scope: Scope) -> &Value {
        match scope {
            Scope::Global => &self.global,
            Scope::Local => &self.local,
        }
    }
}

/// Input of LOAD_STATE
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadStateInput {
    pub state: LoadStatePayload,
    /// Number of operations the load replaces
    pub operations: usize,
}

pub fn undo(count: u32, scope: Scope) -> Action {
    Action::control(UNDO, json!(count), scope)
}

pub fn redo(count: u32, scope: Scope) -> Action {
    Action::control(REDO, json!(count), scope)
}

pub fn prune(start: Option<usize>, end: Option<usize>, scope: Scope) -> Action {
    Action::control(PRUNE, json!(PruneInput { start, end }), scope)
}

pub fn set_name(name: impl Into<String>) -> Action {
    Action::control(SET_NAME, Value::String(name.into()), Scope::Global)
}

pub fn noop(scope: Scope) -> Action {
    Action::control(NOOP, Value::Null, scope)
}

pub(crate) fn load_state(state: LoadStatePayload, operations: usize, scope: Scope) -> Action {
    Action::control(
        LOAD_STATE,
        json!(LoadStateInput { state, operations }),
        scope,
    )
}
