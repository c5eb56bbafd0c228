//! Persisted document layout
//!
//! ```text
//! header.json         header
//! state.json          initial state (name and scope states)
//! current-state.json  current scope states
//! operations.json     per-scope operations, resulting states stripped
//! attachments.json    attachment metadata, keyed by reference
//! attachments/<file>  decoded attachment content
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::backend::ContainerBackend;
use crate::document::{
    replay_document, Document, DocumentState, Header, InitialState, ReplayOptions, ScopeState,
    StateReducer,
};
use crate::error::{DocumentError, Result};
use crate::history::{
    check_operations_integrity, filter_document_operations_resulting_state, Attachment, Operation,
    PerScope, Scope,
};

pub const HEADER_ENTRY: &str = "header.json";
pub const STATE_ENTRY: &str = "state.json";
pub const CURRENT_STATE_ENTRY: &str = "current-state.json";
pub const OPERATIONS_ENTRY: &str = "operations.json";
pub const ATTACHMENTS_ENTRY: &str = "attachments.json";
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Metadata of one stored attachment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentEntry {
    /// Entry holding the decoded content
    pub file: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Everything persisted for one document
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentContainer<G, L> {
    pub header: Header,
    pub initial_state: InitialState<G, L>,
    pub state: DocumentState<G, L>,
    pub operations: PerScope<Vec<Operation>>,
    pub attachments: BTreeMap<String, Attachment>,
}

impl<G: ScopeState, L: ScopeState> DocumentContainer<G, L> {
    pub fn from_document(document: &Document<G, L>) -> Self {
        Self {
            header: document.header.clone(),
            initial_state: document.initial_state.clone(),
            state: document.state.clone(),
            operations: filter_document_operations_resulting_state(&document.operations),
            attachments: document.attachments.clone(),
        }
    }

    pub async fn write(&self, backend: &dyn ContainerBackend) -> Result<()> {
        backend.store(HEADER_ENTRY, to_json(&self.header)?).await?;
        backend.store(STATE_ENTRY, to_json(&self.initial_state)?).await?;
        backend.store(CURRENT_STATE_ENTRY, to_json(&self.state)?).await?;
        backend.store(OPERATIONS_ENTRY, to_json(&self.operations)?).await?;

        let mut manifest = BTreeMap::new();
        for (reference, attachment) in &self.attachments {
            let file = format!("{}/{}", ATTACHMENTS_DIR, hex::encode(reference));
            let content = STANDARD.decode(&attachment.data).map_err(|e| {
                DocumentError::Storage(format!("Attachment {} is not base64: {}", reference, e))
            })?;
            backend.store(&file, content).await?;
            manifest.insert(
                reference.clone(),
                AttachmentEntry {
                    file,
                    mime_type: attachment.mime_type.clone(),
                    extension: attachment.extension.clone(),
                    file_name: attachment.file_name.clone(),
                },
            );
        }
        backend.store(ATTACHMENTS_ENTRY, to_json(&manifest)?).await?;

        log::debug!(
            "Stored document {} with {} attachments",
            self.header.id,
            manifest.len()
        );
        Ok(())
    }

    pub async fn read(backend: &dyn ContainerBackend) -> Result<Self> {
        let header: Header = from_json(backend, HEADER_ENTRY).await?;
        let initial_state = from_json(backend, STATE_ENTRY).await?;
        let state = from_json(backend, CURRENT_STATE_ENTRY).await?;
        let operations = from_json(backend, OPERATIONS_ENTRY).await?;

        let mut attachments = BTreeMap::new();
        if backend.exists(ATTACHMENTS_ENTRY).await? {
            let manifest: BTreeMap<String, AttachmentEntry> =
                from_json(backend, ATTACHMENTS_ENTRY).await?;
            for (reference, entry) in manifest {
                let content = backend.load(&entry.file).await?;
                attachments.insert(
                    reference,
                    Attachment {
                        data: STANDARD.encode(content),
                        mime_type: entry.mime_type,
                        extension: entry.extension,
                        file_name: entry.file_name,
                    },
                );
            }
        }

        Ok(Self {
            header,
            initial_state,
            state,
            operations,
            attachments,
        })
    }

    /// Every integrity issue across all scopes
    pub fn integrity_issues(&self) -> Vec<crate::history::IntegrityIssue> {
        Scope::ALL
            .into_iter()
            .flat_map(|scope| {
                check_operations_integrity(self.operations.get(scope))
                    .into_iter()
                    .map(move |issue| issue.in_scope(scope))
            })
            .collect()
    }

    /// Validate the stored history and rebuild the document from it
    pub fn into_document<R>(self, reducer: &R) -> Result<Document<G, L>>
    where
        R: StateReducer<G, L> + ?Sized,
    {
        let issues = self.integrity_issues();
        if !issues.is_empty() {
            for issue in &issues {
                log::warn!("Document {}: {}", self.header.id, issue);
            }
            return Err(DocumentError::IntegrityViolation(issues));
        }

        let mut document = replay_document(
            &self.initial_state,
            &self.operations,
            reducer,
            &self.header,
            None,
            &ReplayOptions::default(),
        )?;
        document.attachments.extend(self.attachments);

        if document.state.scope_value(Scope::Global)? != self.state.scope_value(Scope::Global)?
            || document.state.scope_value(Scope::Local)? != self.state.scope_value(Scope::Local)?
        {
            log::warn!(
                "Document {}: stored current state differs from replayed state",
                document.header.id
            );
        }
        Ok(document)
    }
}

/// Persist `document` into `backend`
pub async fn save_document<G, L>(
    backend: &dyn ContainerBackend,
    document: &Document<G, L>,
) -> Result<()>
where
    G: ScopeState,
    L: ScopeState,
{
    DocumentContainer::from_document(document).write(backend).await
}

/// Read a document from `backend`, validating and replaying its history
pub async fn load_document<G, L, R>(
    backend: &dyn ContainerBackend,
    reducer: &R,
) -> Result<Document<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    DocumentContainer::read(backend).await?.into_document(reducer)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}

async fn from_json<T: DeserializeOwned>(backend: &dyn ContainerBackend, name: &str) -> Result<T> {
    let bytes = backend.load(name).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DocumentError::Storage(format!("Malformed {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{create_document, dispatch, DispatchOptions, SignalHandler};
    use crate::error::ReducerError;
    use crate::history::{create_action, Action, AttachmentInput};
    use crate::storage::MemoryBackend;
    use serde_json::{json, Value};

    fn tally(
        state: &mut DocumentState<Value, Value>,
        action: &Action,
        _signals: Option<&dyn SignalHandler>,
    ) -> std::result::Result<(), ReducerError> {
        if action.action_type == "ADD" {
            let count = state.global["count"].as_i64().unwrap_or(0);
            state.global = json!({"count": count + 1});
        }
        Ok(())
    }

    fn document() -> Document<Value, Value> {
        let doc = create_document("test/tally", DocumentState::new(json!({"count": 0}), json!({})));
        let attachment = AttachmentInput {
            hash: "h1".into(),
            attachment: Attachment {
                data: STANDARD.encode(b"hello"),
                mime_type: "text/plain".into(),
                extension: None,
                file_name: Some("hello.txt".into()),
            },
        };
        let add = create_action("ADD", Value::Null, vec![attachment], None, Scope::Global).unwrap();
        let options = DispatchOptions::default().reuse_resulting_state(true);
        dispatch(&doc, add, &tally, None, &options).unwrap()
    }

    #[tokio::test]
    async fn test_container_round_trip() {
        let backend = MemoryBackend::new();
        let doc = document();
        save_document(&backend, &doc).await.unwrap();

        let entries = backend.entries().await.unwrap();
        assert!(entries.contains(&HEADER_ENTRY.to_string()));
        assert!(entries.contains(&format!("attachments/{}", hex::encode("attachment://h1"))));

        let stored: PerScope<Vec<Operation>> =
            serde_json::from_slice(&backend.load(OPERATIONS_ENTRY).await.unwrap()).unwrap();
        assert!(stored.global[0].resulting_state.is_none());

        let loaded: Document<Value, Value> = load_document(&backend, &tally).await.unwrap();
        assert_eq!(loaded.state, doc.state);
        assert_eq!(loaded.header, doc.header);
        assert_eq!(loaded.attachments, doc.attachments);
    }

    #[tokio::test]
    async fn test_load_rejects_broken_history() {
        let backend = MemoryBackend::new();
        let mut container = DocumentContainer::from_document(&document());
        container.operations.global[0].index = 2;
        container.write(&backend).await.unwrap();

        let err = load_document::<Value, Value, _>(&backend, &tally).await.unwrap_err();
        match err {
            DocumentError::IntegrityViolation(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].scope, Some(Scope::Global));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
