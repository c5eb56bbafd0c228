//! Ed25519 signer and verifier, plus presigned document headers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::signature::{MessageSigner, SignatureVerifier};
use crate::document::{stable_stringify, Header, HeaderSignature};
use crate::error::{Result, SigningError};

/// Signs with a locally held Ed25519 key
pub struct KeyPairSigner {
    signing_key: SigningKey,
}

impl KeyPairSigner {
    /// Create a signer with a fresh key
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let secret: [u8; 32] = secret.try_into().map_err(|_| {
            SigningError::InvalidKey(format!("expected 32 secret key bytes, got {}", secret.len()))
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// `0x`-prefixed hex of the verifying key
    pub fn public_key(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.verifying_key().to_bytes()))
    }
}

#[async_trait]
impl MessageSigner for KeyPairSigner {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

/// Verifies Ed25519 signatures against `0x`-prefixed hex public keys
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

#[async_trait]
impl SignatureVerifier for Ed25519Verifier {
    async fn verify(&self, public_key: &str, signature: &[u8], message: &[u8]) -> Result<bool> {
        let key = parse_public_key(public_key)?;
        let Ok(signature) = <[u8; 64]>::try_from(signature) else {
            return Ok(false);
        };
        let signature = ed25519_dalek::Signature::from_bytes(&signature);
        Ok(key.verify(message, &signature).is_ok())
    }
}

fn parse_public_key(public_key: &str) -> Result<VerifyingKey> {
    let encoded = public_key.strip_prefix("0x").unwrap_or(public_key);
    let bytes = hex::decode(encoded).map_err(|e| SigningError::Encoding(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SigningError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
    let key = VerifyingKey::from_bytes(&bytes)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    Ok(key)
}

/// What a presigned header id commits to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningParameters {
    pub document_type: String,
    pub created_at_utc_iso: DateTime<Utc>,
    pub nonce: String,
}

impl SigningParameters {
    fn message(&self) -> Result<Vec<u8>> {
        let value = serde_json::to_value(self)?;
        Ok(stable_stringify(&value).into_bytes())
    }
}

/// Replace the header id with a signature over its type, creation time and
/// a fresh nonce, so the id proves who created the document.
pub async fn sign_header(
    mut header: Header,
    signer: &dyn MessageSigner,
    public_key: &str,
) -> Result<Header> {
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);

    let params = SigningParameters {
        document_type: header.document_type.clone(),
        created_at_utc_iso: header.created_at_utc_iso,
        nonce: hex::encode(nonce),
    };
    let signature = signer.sign(&params.message()?).await?;

    header.id = hex::encode(signature);
    header.sig = Some(HeaderSignature {
        public_key: public_key.to_string(),
        nonce: params.nonce,
    });
    Ok(header)
}

/// Check that a presigned header id matches its signing parameters
pub async fn verify_header(header: &Header, verifier: &dyn SignatureVerifier) -> Result<bool> {
    let sig = header
        .sig
        .as_ref()
        .ok_or_else(|| SigningError::MissingSigner(format!("header {}", header.id)))?;
    let params = SigningParameters {
        document_type: header.document_type.clone(),
        created_at_utc_iso: header.created_at_utc_iso,
        nonce: sig.nonce.clone(),
    };
    let Ok(signature) = hex::decode(&header.id) else {
        return Ok(false);
    };
    verifier
        .verify(&sig.public_key, &signature, &params.message()?)
        .await
}
