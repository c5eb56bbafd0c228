//! The document envelope
//!
//! A Document carries an immutable initial snapshot, the per-scope
//! operation histories and the current state. The current state is always
//! what replaying the histories over the initial snapshot produces.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::hash::HashConfig;
use crate::error::Result;
use crate::history::{Attachment, Operation, PerScope, Scope};

/// Bounds every scope state type has to meet
pub trait ScopeState: Clone + Serialize + DeserializeOwned {}

impl<T> ScopeState for T where T: Clone + Serialize + DeserializeOwned {}

/// Proof that a header id was produced by the holder of `public_key`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderSignature {
    pub public_key: String,
    pub nonce: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub id: String,
    pub document_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub revision: PerScope<u64>,
    pub created_at_utc_iso: DateTime<Utc>,
    pub last_modified_at_utc_iso: DateTime<Utc>,
    #[serde(default)]
    pub hash_config: HashConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<HeaderSignature>,
}

impl Header {
    pub fn new(document_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            document_type: document_type.into(),
            name: String::new(),
            slug: None,
            revision: PerScope::default(),
            created_at_utc_iso: now,
            last_modified_at_utc_iso: now,
            hash_config: HashConfig::default(),
            sig: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentState<G, L> {
    pub global: G,
    pub local: L,
}

impl<G: ScopeState, L: ScopeState> DocumentState<G, L> {
    pub fn new(global: G, local: L) -> Self {
        Self { global, local }
    }

    pub fn scope_value(&self, scope: Scope) -> Result<Value> {
        let value = match scope {
            Scope::Global => serde_json::to_value(&self.global)?,
            Scope::Local => serde_json::to_value(&self.local)?,
        };
        Ok(value)
    }

    /// Replace one scope from its JSON form, leaving the state untouched on error
    pub fn replace_scope(&mut self, scope: Scope, value: Value) -> Result<()> {
        match scope {
            Scope::Global => self.global = serde_json::from_value(value)?,
            Scope::Local => self.local = serde_json::from_value(value)?,
        }
        Ok(())
    }

    pub fn copy_scope_from(&mut self, scope: Scope, other: &Self) {
        match scope {
            Scope::Global => self.global = other.global.clone(),
            Scope::Local => self.local = other.local.clone(),
        }
    }

    pub fn hash_scope(&self, scope: Scope, config: &HashConfig) -> Result<String> {
        match scope {
            Scope::Global => config.hash_value(&self.global),
            Scope::Local => config.hash_value(&self.local),
        }
    }
}

/// Snapshot every replay starts from
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialState<G, L> {
    #[serde(default)]
    pub name: String,
    pub state: DocumentState<G, L>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<G, L> {
    pub header: Header,
    pub state: DocumentState<G, L>,
    pub initial_state: InitialState<G, L>,
    pub operations: PerScope<Vec<Operation>>,
    /// Undone operations available for redo, newest index first
    #[serde(default)]
    pub clipboard: Vec<Operation>,
    #[serde(default)]
    pub attachments: BTreeMap<String, Attachment>,
}

impl<G: ScopeState, L: ScopeState> Document<G, L> {
    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn revision(&self, scope: Scope) -> u64 {
        *self.header.revision.get(scope)
    }

    pub fn operations(&self, scope: Scope) -> &[Operation] {
        self.operations.get(scope)
    }

    /// Set the starting name of the document
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.header.name = name.clone();
        self.initial_state.name = name;
        self
    }

    pub fn with_hash_config(mut self, config: HashConfig) -> Self {
        self.header.hash_config = config;
        self
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.initial_state.name = header.name.clone();
        self.header = header;
        self
    }

    pub fn hash_scope(&self, scope: Scope) -> Result<String> {
        self.state.hash_scope(scope, &self.header.hash_config)
    }

    /// Recompute `revision[scope]` and the modification time from history
    pub(crate) fn refresh_revision(&mut self, scope: Scope) {
        let next = self
            .operations
            .get(scope)
            .last()
            .map(|op| op.index + 1)
            .unwrap_or(0);
        *self.header.revision.get_mut(scope) = next;

        let latest = self
            .operations
            .iter()
            .flat_map(|(_, ops)| ops.iter())
            .map(|op| op.timestamp_utc_ms)
            .max();
        if let Some(latest) = latest {
            self.header.last_modified_at_utc_iso = latest;
        }
    }
}

/// Start a document from its initial state
pub fn create_document<G: ScopeState, L: ScopeState>(
    document_type: impl Into<String>,
    state: DocumentState<G, L>,
) -> Document<G, L> {
    Document {
        header: Header::new(document_type),
        state: state.clone(),
        initial_state: InitialState {
            name: String::new(),
            state,
        },
        operations: PerScope::default(),
        clipboard: Vec::new(),
        attachments: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: i64,
    }

    #[test]
    fn test_create_document() {
        let doc = create_document("test/counter", DocumentState::new(Counter::default(), Value::Null))
            .with_name("Counts");

        assert_eq!(doc.header.document_type, "test/counter");
        assert_eq!(doc.name(), "Counts");
        assert_eq!(doc.initial_state.name, "Counts");
        assert_eq!(doc.revision(Scope::Global), 0);
        assert!(doc.operations(Scope::Local).is_empty());
        assert_eq!(doc.state, doc.initial_state.state);
    }

    #[test]
    fn test_replace_scope() {
        let mut state = DocumentState::new(Counter { count: 1 }, json!({}));

        state.replace_scope(Scope::Global, json!({"count": 7})).unwrap();
        assert_eq!(state.global.count, 7);

        assert!(state.replace_scope(Scope::Global, json!({"count": "x"})).is_err());
        assert_eq!(state.global.count, 7);
    }

    #[test]
    fn test_hash_scope_tracks_state() {
        let config = HashConfig::default();
        let mut state = DocumentState::new(Counter { count: 1 }, json!({"selected": null}));
        let before = state.hash_scope(Scope::Global, &config).unwrap();
        let local = state.hash_scope(Scope::Local, &config).unwrap();

        state.global.count += 1;
        assert_ne!(state.hash_scope(Scope::Global, &config).unwrap(), before);
        assert_eq!(state.hash_scope(Scope::Local, &config).unwrap(), local);
    }

    #[test]
    fn test_document_json_shape() {
        let doc = create_document("test/counter", DocumentState::new(Counter::default(), json!({})));
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["header"]["documentType"], "test/counter");
        assert_eq!(value["header"]["revision"]["global"], 0);
        assert_eq!(value["initialState"]["state"]["global"]["count"], 0);

        let back: Document<Counter, Value> = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }
}
