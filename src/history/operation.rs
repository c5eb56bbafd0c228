//! Operations: actions positioned in a scope's history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::{Action, NOOP};
use super::scope::Scope;

/// Position of an entry in a scope history.
///
/// Ordering, garbage collection and integrity checks only look at these two
/// numbers, so they work on full operations and bare positions alike.
pub trait OperationIndex {
    fn index(&self) -> u64;
    fn skip(&self) -> u32;

    /// First index this entry stands for once its skip is applied
    fn covered_from(&self) -> i64 {
        self.index() as i64 - self.skip() as i64
    }
}

/// A bare history position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpIndex {
    pub index: u64,
    pub skip: u32,
}

impl OpIndex {
    pub fn new(index: u64, skip: u32) -> Self {
        Self { index, skip }
    }

    pub fn of<T: OperationIndex>(entry: &T) -> Self {
        Self::new(entry.index(), entry.skip())
    }
}

impl OperationIndex for OpIndex {
    fn index(&self) -> u64 {
        self.index
    }

    fn skip(&self) -> u32 {
        self.skip
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub index: u64,
    pub timestamp_utc_ms: DateTime<Utc>,
    /// Hash of the scope state after this operation, empty when unknown
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub skip: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Serialized scope state after this operation, used as a replay checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: Action,
}

impl Operation {
    /// Position a freshly dispatched action in history
    pub fn new(action: Action, index: u64, skip: u32) -> Self {
        Self {
            index,
            timestamp_utc_ms: Utc::now(),
            hash: String::new(),
            skip,
            error: None,
            resulting_state: None,
            id: Some(Uuid::new_v4().to_string()),
            action,
        }
    }

    pub fn action_type(&self) -> &str {
        &self.action.action_type
    }

    pub fn scope(&self) -> Scope {
        self.action.scope
    }

    pub fn is_noop(&self) -> bool {
        self.action.action_type == NOOP
    }
}

impl OperationIndex for Operation {
    fn index(&self) -> u64 {
        self.index
    }

    fn skip(&self) -> u32 {
        self.skip
    }
}
