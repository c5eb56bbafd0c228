//! Signing protocol for operations

use async_trait::async_trait;

use super::{ActionSigner, Signature};
use crate::document::{
    dispatch, stable_stringify, Document, DispatchOptions, HashConfig, ScopeState, StateReducer,
};
use crate::error::{Result, SigningError};
use crate::history::action::{PRUNE, REDO, UNDO};
use crate::history::{Action, ActionContext, Operation};

pub const SIGNATURE_PREFIX: &str = "\x19Signed Operation:\n";

/// Produces raw signature bytes for a message
#[async_trait]
pub trait MessageSigner: Send + Sync {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Checks raw signature bytes against a public key
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, public_key: &str, signature: &[u8], message: &[u8]) -> Result<bool>;
}

/// `[unix seconds, app key, action hash, previous state hash]`
pub fn build_operation_signature_params(
    document_id: &str,
    action: &Action,
    previous_state_hash: &str,
    hash_config: &HashConfig,
) -> Result<[String; 4]> {
    let signer = action.signer().ok_or_else(|| {
        SigningError::MissingSigner(format!("{} action {}", action.action_type, action.id))
    })?;
    let action_hash = hash_config.digest(
        format!(
            "{}{}{}{}",
            document_id,
            action.scope,
            action.action_type,
            stable_stringify(&action.input)
        )
        .as_bytes(),
    );

    Ok([
        action.timestamp_utc_ms.timestamp().to_string(),
        signer.app.key.clone(),
        action_hash,
        previous_state_hash.to_string(),
    ])
}

pub fn build_operation_signature_message(params: &[String; 4]) -> Vec<u8> {
    let joined = params.concat();
    format!("{}{}{}", SIGNATURE_PREFIX, joined.len(), joined).into_bytes()
}

pub async fn build_operation_signature(
    document_id: &str,
    action: &Action,
    previous_state_hash: &str,
    hash_config: &HashConfig,
    signer: &dyn MessageSigner,
) -> Result<Signature> {
    let [timestamp, app_key, action_hash, previous] =
        build_operation_signature_params(document_id, action, previous_state_hash, hash_config)?;
    let message = build_operation_signature_message(&[
        timestamp.clone(),
        app_key.clone(),
        action_hash.clone(),
        previous.clone(),
    ]);
    let bytes = signer.sign(&message).await?;

    Ok(Signature(
        timestamp,
        app_key,
        action_hash,
        previous,
        format!("0x{}", hex::encode(bytes)),
    ))
}

/// Dispatch `action` as `signer` and return the operation it produces,
/// with the new signature appended to the action's signature chain.
pub async fn build_signed_action<G, L, R>(
    action: Action,
    reducer: &R,
    document: &Document<G, L>,
    signer: ActionSigner,
    message_signer: &dyn MessageSigner,
) -> Result<Operation>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    if matches!(action.action_type.as_str(), UNDO | REDO | PRUNE) {
        return Err(SigningError::UnsignableAction(action.action_type).into());
    }
    let scope = action.scope;
    let previous_state_hash = document
        .operations(scope)
        .last()
        .map(|op| op.hash.clone())
        .unwrap_or_default();

    let mut context = action.context.clone().unwrap_or_default();
    context.signer = Some(signer.clone());
    let action = action.with_context(context);

    let options = DispatchOptions::default().reuse_resulting_state(true);
    let next = dispatch(document, action.clone(), reducer, None, &options)?;
    let mut operation = next
        .operations(scope)
        .last()
        .cloned()
        .filter(|op| op.action.id == action.id)
        .ok_or_else(|| SigningError::UnsignableAction(action.action_type.clone()))?;

    let signature = build_operation_signature(
        document.id(),
        &action,
        &previous_state_hash,
        &document.header.hash_config,
        message_signer,
    )
    .await?;

    let mut signed = signer;
    signed.signatures.push(signature);
    let context = ActionContext {
        signer: Some(signed),
        ..action.context.clone().unwrap_or_default()
    };
    operation.action = action.with_context(context);
    Ok(operation)
}

/// Check a stored signature against the signer's app key.
///
/// A signature that is not valid hex verifies as `false`.
pub async fn verify_operation_signature(
    signature: &Signature,
    signer: &ActionSigner,
    verifier: &dyn SignatureVerifier,
) -> Result<bool> {
    let message = build_operation_signature_message(&signature.params());
    let encoded = signature.signature();
    let encoded = encoded.strip_prefix("0x").unwrap_or(encoded);
    let bytes = match hex::decode(encoded) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("Undecodable signature {:?}: {}", signature.signature(), err);
            return Ok(false);
        }
    };
    verifier.verify(&signer.app.key, &bytes, &message).await
}
