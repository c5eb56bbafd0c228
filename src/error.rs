use thiserror::Error;

use crate::history::{IntegrityIssue, Scope, ValidationIssue};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Invalid action type: {0:?}")]
    InvalidActionType(String),

    #[error("Invalid action input: {0}")]
    InvalidActionInput(#[from] InputError),

    #[error("Hash mismatch in {scope} scope: expected {expected}, got {actual}")]
    HashMismatch {
        scope: Scope,
        expected: String,
        actual: String,
    },

    #[error("Integrity violation: {}", join_issues(.0))]
    IntegrityViolation(Vec<IntegrityIssue>),

    #[error(
        "Missing operations: expected {expected} with skip 0 or equivalent, got index {index} with skip {skip}"
    )]
    MissingOperations { expected: u64, index: u64, skip: u32 },

    #[error("Cannot undo: {0}")]
    UndoUnderflow(UndoError),

    #[error("Cannot redo: {0}")]
    RedoUnavailable(RedoError),

    #[error("Invalid scope: {0:?}")]
    InvalidScope(String),

    #[error("Invalid prune range {start}..{end} for a history of {len} operations")]
    InvalidPruneRange { start: usize, end: usize, len: usize },

    #[error("The skip header operation index must be greater than or equal to {last_index}, got {index}")]
    InvalidSkipHeader { index: u64, last_index: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
}

/// Why an action input was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("{}", join_validation(.0))]
    Schema(Vec<ValidationIssue>),

    #[error("{0}")]
    Opaque(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UndoError {
    #[error("you can't undo more operations than the ones in the scope history")]
    HistoryExhausted,

    #[error("skip value from reducer cannot be used with UNDO action")]
    SkipHeld(u32),

    #[error("undo count must be at least 1")]
    ZeroCount,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedoError {
    #[error("no operations in the clipboard")]
    EmptyClipboard,

    #[error("no operations in clipboard for scope \"{0}\"")]
    NoMatchingScope(Scope),

    #[error("skip value from reducer cannot be used with REDO action")]
    SkipHeld(u32),

    #[error("you can only redo one operation at a time")]
    BatchUnsupported(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("No signer attached: {0}")]
    MissingSigner(String),

    #[error("Invalid encoding: {0}")]
    Encoding(String),

    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Signer failed: {0}")]
    Signer(String),

    #[error("Cannot sign {0}: it does not record an operation of its own")]
    UnsignableAction(String),
}

/// Failure raised by a custom state reducer.
///
/// Never surfaces from `dispatch`; the message is recorded on the
/// operation and the scope state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ReducerError(String);

impl ReducerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<InputError> for ReducerError {
    fn from(err: InputError) -> Self {
        Self(err.to_string())
    }
}

fn join_issues(issues: &[IntegrityIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_validation(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
