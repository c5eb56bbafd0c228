//! Operation and header signatures
//!
//! Signatures travel on the action (`action.context.signer`), never on the
//! operation itself, so a signed history replays like any other.

mod ed25519;
mod signature;

use serde::{Deserialize, Serialize};

pub use ed25519::{sign_header, verify_header, Ed25519Verifier, KeyPairSigner, SigningParameters};
pub use signature::{
    build_operation_signature, build_operation_signature_message,
    build_operation_signature_params, build_signed_action, verify_operation_signature,
    MessageSigner, SignatureVerifier, SIGNATURE_PREFIX,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerUser {
    pub address: String,
    pub network_id: String,
    pub chain_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerApp {
    pub name: String,
    /// Public key the signatures verify against
    pub key: String,
}

/// Who signed an action, and the chain of signatures collected so far
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSigner {
    pub user: SignerUser,
    pub app: SignerApp,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

impl ActionSigner {
    pub fn new(user: SignerUser, app: SignerApp) -> Self {
        Self {
            user,
            app,
            signatures: Vec::new(),
        }
    }
}

/// `[timestamp, app key, action hash, previous state hash, 0x-signature]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub String, pub String, pub String, pub String, pub String);

impl Signature {
    pub fn timestamp(&self) -> &str {
        &self.0
    }

    pub fn app_key(&self) -> &str {
        &self.1
    }

    pub fn action_hash(&self) -> &str {
        &self.2
    }

    pub fn previous_state_hash(&self) -> &str {
        &self.3
    }

    pub fn signature(&self) -> &str {
        &self.4
    }

    /// The four signed parameters
    pub fn params(&self) -> [String; 4] {
        [
            self.0.clone(),
            self.1.clone(),
            self.2.clone(),
            self.3.clone(),
        ]
    }
}
