//! Replaying stored histories
//!
//! Run with:
//!   cargo test --test replay

use opledger::document::{dispatch, replay_document, undo, DispatchOptions, ReplayOptions};
use opledger::error::DocumentError;
use opledger::history::{
    check_cleaned_operations_integrity, garbage_collect, sort_operations, OpIndex, Scope,
};
use opledger::models::inventory::{self, actions, InventoryDocument, InventoryReducer};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pantry(options: &DispatchOptions) -> InventoryDocument {
    let steps = vec![
        actions::add_item("flour", "Baking", "Flour", "Shelf 1").unwrap(),
        actions::add_item("sugar", "Baking", "Sugar", "Shelf 1").unwrap(),
        actions::add_tag("flour", "dry").unwrap(),
        actions::select_item(Some("sugar")).unwrap(),
        actions::update_item("sugar", None, None, Some("Shelf 2")).unwrap(),
        actions::remove_item("flour").unwrap(),
    ];

    let mut doc = inventory::create_inventory("Pantry");
    for action in steps {
        doc = dispatch(&doc, action, &InventoryReducer, None, options).unwrap();
    }
    doc
}

fn replay(doc: &InventoryDocument, options: &ReplayOptions) -> opledger::Result<InventoryDocument> {
    replay_document(
        &doc.initial_state,
        &doc.operations,
        &InventoryReducer,
        &doc.header,
        None,
        options,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_replay_is_deterministic() {
    let doc = pantry(&DispatchOptions::default());
    let replayed = replay(&doc, &ReplayOptions::default()).unwrap();

    assert_eq!(replayed.state, doc.state);
    assert_eq!(replayed.name(), "Pantry");
    for scope in Scope::ALL {
        assert_eq!(replayed.revision(scope), doc.revision(scope));
        assert_eq!(replayed.hash_scope(scope).unwrap(), doc.hash_scope(scope).unwrap());
    }
}

#[test]
fn test_replay_from_checkpoints() {
    init_logging();
    let doc = pantry(&DispatchOptions::default().reuse_resulting_state(true));
    assert!(doc
        .operations(Scope::Global)
        .iter()
        .all(|op| op.resulting_state.is_some()));

    let options = ReplayOptions::default().reuse_resulting_state(true);
    let replayed = replay(&doc, &options).unwrap();
    assert_eq!(replayed.state, doc.state);
    assert_eq!(replayed.revision(Scope::Global), doc.revision(Scope::Global));
}

#[test]
fn test_replay_after_undo() {
    let doc = undo(&pantry(&DispatchOptions::default()), 2, Scope::Global, &InventoryReducer)
        .unwrap();
    assert!(doc.state.global.items.contains_key("flour"));

    let replayed = replay(&doc, &ReplayOptions::default()).unwrap();
    assert_eq!(replayed.state, doc.state);
    assert_eq!(replayed.operations(Scope::Global), doc.operations(Scope::Global));
}

#[test]
fn test_replay_detects_tampered_hash() {
    let mut doc = pantry(&DispatchOptions::default());
    doc.operations.global[2].hash = "tampered".into();

    let err = replay(&doc, &ReplayOptions::default()).unwrap_err();
    assert!(matches!(err, DocumentError::HashMismatch { scope: Scope::Global, .. }));

    // trusted replay only checks where the history ends up
    let replayed = replay(&doc, &ReplayOptions::default().check_hashes(false)).unwrap();
    assert_eq!(replayed.state, doc.state);

    let last = doc.operations.global.len() - 1;
    doc.operations.global[last].hash = "tampered".into();
    let err = replay(&doc, &ReplayOptions::default().check_hashes(false)).unwrap_err();
    assert!(matches!(err, DocumentError::HashMismatch { .. }));
}

#[test]
fn test_garbage_collection_is_idempotent_on_real_history() {
    let doc = pantry(&DispatchOptions::default());
    let doc = undo(&doc, 1, Scope::Global, &InventoryReducer).unwrap();
    let doc = undo(&doc, 1, Scope::Global, &InventoryReducer).unwrap();
    let doc = inventory::add_tag(&doc, "sugar", "sweet").unwrap();

    let positions: Vec<OpIndex> = doc.operations(Scope::Global).iter().map(OpIndex::of).collect();
    let once = garbage_collect(&sort_operations(positions));
    let twice = garbage_collect(&once);

    assert_eq!(once, twice);
    assert!(check_cleaned_operations_integrity(&once).is_empty());
}
