//! Inventory document model
//!
//! Items with a category, description, location and tags in the global
//! scope; the selected item lives in the local scope. Linked documents are
//! announced to the host through signals.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::document::{
    create_document, dispatch, DispatchOptions, Document, DocumentState, Signal, SignalHandler,
    StateReducer,
};
use crate::error::{ReducerError, Result};
use crate::history::Action;

pub const DOCUMENT_TYPE: &str = "example/inventory";

pub const ADD_ITEM: &str = "ADD_ITEM";
pub const UPDATE_ITEM: &str = "UPDATE_ITEM";
pub const REMOVE_ITEM: &str = "REMOVE_ITEM";
pub const ADD_TAG: &str = "ADD_TAG";
pub const LINK_DOCUMENT: &str = "LINK_DOCUMENT";
pub const UNLINK_DOCUMENT: &str = "UNLINK_DOCUMENT";
pub const SELECT_ITEM: &str = "SELECT_ITEM";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub category: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryState {
    #[serde(default)]
    pub items: BTreeMap<String, InventoryItem>,
    /// Child documents, by id
    #[serde(default)]
    pub linked_documents: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLocalState {
    #[serde(default)]
    pub selected: Option<String>,
}

pub type InventoryDocument = Document<InventoryState, InventoryLocalState>;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AddItemInput {
    id: String,
    category: String,
    description: String,
    location: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct UpdateItemInput {
    id: String,
    category: Option<String>,
    description: Option<String>,
    location: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ItemRef {
    id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AddTagInput {
    id: String,
    tag: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkDocumentInput {
    id: String,
    document_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SelectItemInput {
    id: Option<String>,
}

/// Validated action builders
pub mod actions {
    use serde_json::{json, Value};

    use super::*;
    use crate::history::{create_action, FieldKind, FieldSpec, InputSchema, Scope};

    fn build(action_type: &str, input: Value, schema: InputSchema, scope: Scope) -> Result<Action> {
        create_action(action_type, input, Vec::new(), Some(&schema), scope)
    }

    fn id_schema() -> InputSchema {
        InputSchema::new().with_field(FieldSpec::required("id", FieldKind::String))
    }

    pub fn add_item(id: &str, category: &str, description: &str, location: &str) -> Result<Action> {
        let schema = id_schema()
            .with_field(FieldSpec::required("category", FieldKind::String))
            .with_field(FieldSpec::required("description", FieldKind::String))
            .with_field(FieldSpec::required("location", FieldKind::String));
        build(
            ADD_ITEM,
            json!({"id": id, "category": category, "description": description, "location": location}),
            schema,
            Scope::Global,
        )
    }

    /// Change the given fields of an item, leaving the others as they are
    pub fn update_item(
        id: &str,
        category: Option<&str>,
        description: Option<&str>,
        location: Option<&str>,
    ) -> Result<Action> {
        let schema = id_schema()
            .with_field(FieldSpec::optional("category", FieldKind::String))
            .with_field(FieldSpec::optional("description", FieldKind::String))
            .with_field(FieldSpec::optional("location", FieldKind::String));
        build(
            UPDATE_ITEM,
            json!({"id": id, "category": category, "description": description, "location": location}),
            schema,
            Scope::Global,
        )
    }

    pub fn remove_item(id: &str) -> Result<Action> {
        build(REMOVE_ITEM, json!({ "id": id }), id_schema(), Scope::Global)
    }

    pub fn add_tag(id: &str, tag: &str) -> Result<Action> {
        let schema = id_schema().with_field(FieldSpec::required("tag", FieldKind::String));
        build(ADD_TAG, json!({"id": id, "tag": tag}), schema, Scope::Global)
    }

    pub fn link_document(id: &str, document_type: &str) -> Result<Action> {
        let schema = id_schema().with_field(FieldSpec::required("documentType", FieldKind::String));
        build(
            LINK_DOCUMENT,
            json!({"id": id, "documentType": document_type}),
            schema,
            Scope::Global,
        )
    }

    pub fn unlink_document(id: &str) -> Result<Action> {
        build(UNLINK_DOCUMENT, json!({ "id": id }), id_schema(), Scope::Global)
    }

    /// Select an item, or clear the selection with `None`
    pub fn select_item(id: Option<&str>) -> Result<Action> {
        let schema = InputSchema::new().with_field(FieldSpec::optional("id", FieldKind::String));
        build(SELECT_ITEM, json!({ "id": id }), schema, Scope::Local)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InventoryReducer;

impl StateReducer<InventoryState, InventoryLocalState> for InventoryReducer {
    fn reduce(
        &self,
        state: &mut DocumentState<InventoryState, InventoryLocalState>,
        action: &Action,
        signals: Option<&dyn SignalHandler>,
    ) -> std::result::Result<(), ReducerError> {
        let items = &mut state.global.items;
        match action.action_type.as_str() {
            ADD_ITEM => {
                let input: AddItemInput = input(action)?;
                if items.contains_key(&input.id) {
                    return Err(ReducerError::new(format!("Item {} already exists", input.id)));
                }
                items.insert(
                    input.id.clone(),
                    InventoryItem {
                        id: input.id,
                        category: input.category,
                        description: input.description,
                        location: input.location,
                        tags: BTreeSet::new(),
                    },
                );
            }
            UPDATE_ITEM => {
                let input: UpdateItemInput = input(action)?;
                let item = item_mut(items, &input.id)?;
                if let Some(category) = input.category {
                    item.category = category;
                }
                if let Some(description) = input.description {
                    item.description = description;
                }
                if let Some(location) = input.location {
                    item.location = location;
                }
            }
            REMOVE_ITEM => {
                let input: ItemRef = input(action)?;
                if items.remove(&input.id).is_none() {
                    return Err(not_found(&input.id));
                }
            }
            ADD_TAG => {
                let input: AddTagInput = input(action)?;
                item_mut(items, &input.id)?.tags.insert(input.tag);
            }
            LINK_DOCUMENT => {
                let input: LinkDocumentInput = input(action)?;
                if !state.global.linked_documents.insert(input.id.clone()) {
                    return Err(ReducerError::new(format!("Document {} is already linked", input.id)));
                }
                if let Some(signals) = signals {
                    signals.dispatch(Signal::CreateChildDocument {
                        id: input.id,
                        document_type: input.document_type,
                    });
                }
            }
            UNLINK_DOCUMENT => {
                let input: ItemRef = input(action)?;
                if !state.global.linked_documents.remove(&input.id) {
                    return Err(ReducerError::new(format!("Document {} is not linked", input.id)));
                }
                if let Some(signals) = signals {
                    signals.dispatch(Signal::DeleteChildDocument { id: input.id });
                }
            }
            SELECT_ITEM => {
                let input: SelectItemInput = input(action)?;
                state.local.selected = input.id;
            }
            other => {
                log::debug!("Inventory reducer ignoring {}", other);
            }
        }
        Ok(())
    }
}

fn input<T: serde::de::DeserializeOwned>(action: &Action) -> std::result::Result<T, ReducerError> {
    action
        .parse_input()
        .map_err(|e| ReducerError::new(e.to_string()))
}

fn item_mut<'a>(
    items: &'a mut BTreeMap<String, InventoryItem>,
    id: &str,
) -> std::result::Result<&'a mut InventoryItem, ReducerError> {
    items.get_mut(id).ok_or_else(|| not_found(id))
}

fn not_found(id: &str) -> ReducerError {
    ReducerError::new(format!("Item {} not found", id))
}

/// An empty inventory
pub fn create_inventory(name: &str) -> InventoryDocument {
    create_document(DOCUMENT_TYPE, DocumentState::default()).with_name(name)
}

/// Dispatch an inventory action with default options
pub fn apply(
    document: &InventoryDocument,
    action: Action,
    signals: Option<&dyn SignalHandler>,
) -> Result<InventoryDocument> {
    dispatch(
        document,
        action,
        &InventoryReducer,
        signals,
        &DispatchOptions::default(),
    )
}

pub fn add_item(
    document: &InventoryDocument,
    id: &str,
    category: &str,
    description: &str,
    location: &str,
) -> Result<InventoryDocument> {
    apply(
        document,
        actions::add_item(id, category, description, location)?,
        None,
    )
}

pub fn update_item(
    document: &InventoryDocument,
    id: &str,
    category: Option<&str>,
    description: Option<&str>,
    location: Option<&str>,
) -> Result<InventoryDocument> {
    apply(
        document,
        actions::update_item(id, category, description, location)?,
        None,
    )
}

pub fn remove_item(document: &InventoryDocument, id: &str) -> Result<InventoryDocument> {
    apply(document, actions::remove_item(id)?, None)
}

pub fn add_tag(document: &InventoryDocument, id: &str, tag: &str) -> Result<InventoryDocument> {
    apply(document, actions::add_tag(id, tag)?, None)
}

pub fn link_document(
    document: &InventoryDocument,
    id: &str,
    document_type: &str,
    signals: Option<&dyn SignalHandler>,
) -> Result<InventoryDocument> {
    apply(document, actions::link_document(id, document_type)?, signals)
}

pub fn unlink_document(
    document: &InventoryDocument,
    id: &str,
    signals: Option<&dyn SignalHandler>,
) -> Result<InventoryDocument> {
    apply(document, actions::unlink_document(id)?, signals)
}

pub fn select_item(document: &InventoryDocument, id: Option<&str>) -> Result<InventoryDocument> {
    apply(document, actions::select_item(id)?, None)
}

/// Items carrying `tag`, in id order
pub fn items_tagged<'a>(state: &'a InventoryState, tag: &str) -> Vec<&'a InventoryItem> {
    state
        .items
        .values()
        .filter(|item| item.tags.contains(tag))
        .collect()
}
