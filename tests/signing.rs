//! Signed operations and presigned headers with ed25519 keys
//!
//! Run with:
//!   cargo test --test signing

use opledger::document::{replay_document, ReplayOptions};
use opledger::history::{Operation, Scope};
use opledger::models::inventory::{self, actions, InventoryDocument, InventoryReducer};
use opledger::signing::{
    build_signed_action, sign_header, verify_header, verify_operation_signature, ActionSigner,
    Ed25519Verifier, KeyPairSigner, Signature, SignerApp, SignerUser,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn action_signer(keys: &KeyPairSigner) -> ActionSigner {
    ActionSigner::new(
        SignerUser {
            address: "0x1234567890abcdef1234567890abcdef12345678".into(),
            network_id: "eip155".into(),
            chain_id: 1,
        },
        SignerApp {
            name: "inventory-desk".into(),
            key: keys.public_key(),
        },
    )
}

fn stocked() -> InventoryDocument {
    let doc = inventory::create_inventory("Signed shelf");
    inventory::add_item(&doc, "lamp", "Lighting", "Desk lamp", "Desk").unwrap()
}

async fn signed_tag(doc: &InventoryDocument, keys: &KeyPairSigner) -> Operation {
    build_signed_action(
        actions::add_tag("lamp", "fragile").unwrap(),
        &InventoryReducer,
        doc,
        action_signer(keys),
        keys,
    )
    .await
    .unwrap()
}

fn only_signature(operation: &Operation) -> (ActionSigner, Signature) {
    let signer = operation.action.signer().cloned().unwrap();
    assert_eq!(signer.signatures.len(), 1);
    let signature = signer.signatures[0].clone();
    (signer, signature)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_signed_operation_verifies() {
    let keys = KeyPairSigner::generate();
    let doc = stocked();
    let operation = signed_tag(&doc, &keys).await;

    assert_eq!(operation.index, 1);
    assert!(operation.resulting_state.is_some());

    let (signer, signature) = only_signature(&operation);
    assert_eq!(signature.app_key(), keys.public_key());
    assert_eq!(
        signature.previous_state_hash(),
        doc.operations(Scope::Global)[0].hash
    );
    assert_eq!(signature.signature().len(), 2 + 128);
    assert!(verify_operation_signature(&signature, &signer, &Ed25519Verifier)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_altered_signature_does_not_verify() {
    let keys = KeyPairSigner::generate();
    let operation = signed_tag(&stocked(), &keys).await;
    let (signer, signature) = only_signature(&operation);

    let fake = Signature(
        signature.timestamp().into(),
        signature.app_key().into(),
        signature.action_hash().into(),
        signature.previous_state_hash().into(),
        "FAKE SIGNATURE".into(),
    );
    assert!(!verify_operation_signature(&fake, &signer, &Ed25519Verifier)
        .await
        .unwrap());

    let moved = Signature(
        signature.timestamp().into(),
        signature.app_key().into(),
        signature.action_hash().into(),
        "another-previous-hash".into(),
        signature.signature().into(),
    );
    assert!(!verify_operation_signature(&moved, &signer, &Ed25519Verifier)
        .await
        .unwrap());

    let stranger = action_signer(&KeyPairSigner::generate());
    assert!(!verify_operation_signature(&signature, &stranger, &Ed25519Verifier)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_signed_operation_replays_like_any_other() {
    let keys = KeyPairSigner::generate();
    let doc = stocked();
    let operation = signed_tag(&doc, &keys).await;

    let mut operations = doc.operations.clone();
    operations.global.push(operation.clone());
    let replayed = replay_document(
        &doc.initial_state,
        &operations,
        &InventoryReducer,
        &doc.header,
        None,
        &ReplayOptions::default(),
    )
    .unwrap();

    assert!(replayed.state.global.items["lamp"].tags.contains("fragile"));
    let last = replayed.operations(Scope::Global).last().unwrap();
    assert_eq!(last.hash, operation.hash);
    assert!(last.action.signer().is_some());
}

#[tokio::test]
async fn test_presigned_document_header() {
    let keys = KeyPairSigner::generate();
    let doc = stocked();
    let header = sign_header(doc.header.clone(), &keys, &keys.public_key())
        .await
        .unwrap();
    let doc = doc.with_header(header);

    assert_eq!(doc.id().len(), 128);
    assert!(verify_header(&doc.header, &Ed25519Verifier).await.unwrap());

    let mut forged = doc.header.clone();
    forged.sig = forged.sig.map(|mut sig| {
        sig.nonce = "00".repeat(16);
        sig
    });
    assert!(!verify_header(&forged, &Ed25519Verifier).await.unwrap());
}
