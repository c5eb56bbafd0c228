//! Deterministic state hashing
//!
//! State is rendered as JSON with object keys sorted at every level, then
//! digested with the algorithm and encoding named in the document header.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashEncoding {
    #[default]
    Base64,
    Hex,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    #[serde(default)]
    pub algorithm: HashAlgorithm,
    #[serde(default)]
    pub encoding: HashEncoding,
}

impl HashConfig {
    pub fn new(algorithm: HashAlgorithm, encoding: HashEncoding) -> Self {
        Self {
            algorithm,
            encoding,
        }
    }

    pub fn digest(&self, data: &[u8]) -> String {
        let bytes = match self.algorithm {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        };
        match self.encoding {
            HashEncoding::Base64 => STANDARD.encode(bytes),
            HashEncoding::Hex => hex::encode(bytes),
        }
    }

    /// Hash any serializable value through its stable JSON form
    pub fn hash_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_value(value)?;
        Ok(self.digest(stable_stringify(&json).as_bytes()))
    }
}

/// Compact JSON with object keys sorted at every level
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_stable(&map[key], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
