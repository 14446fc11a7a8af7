//! Self-describing encrypted envelopes
//!
//! An [`Envelope`] carries symmetric ciphertext, the wrapped one-time key, the
//! IV and detached tag (all standard base64), and a [`KeyIdentity`] naming the
//! key that can unwrap it. Envelopes are immutable; re-sealing produces a new
//! one.
//!
//! ```json
//! {
//!   "ciphertext": "...",
//!   "wrappedKey": "...",
//!   "iv": "...",
//!   "authTag": "...",
//!   "keyIdentity": { "mode": "remote", "keyPath": "compliance/documents", "keyVersion": "3" }
//! }
//! ```
//!
//! `keyIdentity` is omitted for locally-wrapped envelopes.

pub mod codec;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::crypto::symmetric::NONCE_SIZE;
use crate::error::{VaultError, VaultResult};

pub use codec::{EnvelopeCodec, UnwrapCredential, WrapMode};

/// Which key unwraps an envelope's data key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum KeyIdentity {
    /// A caller-held RSA private key
    #[default]
    Local,

    /// A custodial key version
    Remote {
        #[serde(rename = "keyPath")]
        key_path: String,
        #[serde(rename = "keyVersion")]
        key_version: String,
    },
}

impl KeyIdentity {
    pub fn is_local(&self) -> bool {
        matches!(self, KeyIdentity::Local)
    }
}

impl std::fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyIdentity::Local => write!(f, "local"),
            KeyIdentity::Remote {
                key_path,
                key_version,
            } => write!(f, "remote:{}@{}", key_path, key_version),
        }
    }
}

/// An encrypted payload with everything needed to open it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    ciphertext: String,
    wrapped_key: String,
    iv: String,
    auth_tag: String,
    #[serde(default, skip_serializing_if = "KeyIdentity::is_local")]
    key_identity: KeyIdentity,
}

/// Binary form of an envelope after structural validation
#[derive(Debug)]
pub(crate) struct DecodedEnvelope {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub iv: [u8; NONCE_SIZE],
    pub auth_tag: Vec<u8>,
}

impl Envelope {
    pub(crate) fn seal(
        ciphertext: &[u8],
        wrapped_key: &[u8],
        iv: &[u8],
        auth_tag: &[u8],
        key_identity: KeyIdentity,
    ) -> Self {
        Self {
            ciphertext: STANDARD.encode(ciphertext),
            wrapped_key: STANDARD.encode(wrapped_key),
            iv: STANDARD.encode(iv),
            auth_tag: STANDARD.encode(auth_tag),
            key_identity,
        }
    }

    /// Assemble an envelope from stored base64 fields
    ///
    /// No validation happens here; malformed fields are rejected when the
    /// envelope is opened.
    pub fn from_parts(
        ciphertext: impl Into<String>,
        wrapped_key: impl Into<String>,
        iv: impl Into<String>,
        auth_tag: impl Into<String>,
        key_identity: KeyIdentity,
    ) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            wrapped_key: wrapped_key.into(),
            iv: iv.into(),
            auth_tag: auth_tag.into(),
            key_identity,
        }
    }

    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    pub fn wrapped_key(&self) -> &str {
        &self.wrapped_key
    }

    pub fn iv(&self) -> &str {
        &self.iv
    }

    pub fn auth_tag(&self) -> &str {
        &self.auth_tag
    }

    pub fn key_identity(&self) -> &KeyIdentity {
        &self.key_identity
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> VaultResult<String> {
        serde_json::to_string(self)
            .map_err(|e| VaultError::Json(format!("Failed to serialize envelope: {}", e)))
    }

    /// Parse an envelope; missing or mistyped fields are a validation error
    pub fn from_json(json: &str) -> VaultResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| VaultError::validation(format!("Malformed envelope: {}", e)))
    }

    /// Check structure and decode every field before any cryptography runs
    ///
    /// The auth tag is only required to be base64 here. A tag of the wrong
    /// length fails the tag check during decryption instead.
    pub(crate) fn decode(&self) -> VaultResult<DecodedEnvelope> {
        let ciphertext = decode_field("ciphertext", &self.ciphertext)?;

        if self.wrapped_key.is_empty() {
            return Err(VaultError::validation("wrappedKey is missing"));
        }
        let wrapped_key = decode_field("wrappedKey", &self.wrapped_key)?;

        if self.iv.is_empty() {
            return Err(VaultError::validation("iv is missing"));
        }
        let iv_bytes = decode_field("iv", &self.iv)?;
        let iv: [u8; NONCE_SIZE] = iv_bytes.as_slice().try_into().map_err(|_| {
            VaultError::validation(format!(
                "iv must be {} bytes, got {}",
                NONCE_SIZE,
                iv_bytes.len()
            ))
        })?;

        if self.auth_tag.is_empty() {
            return Err(VaultError::validation("authTag is missing"));
        }
        let auth_tag = decode_field("authTag", &self.auth_tag)?;

        if let KeyIdentity::Remote {
            key_path,
            key_version,
        } = &self.key_identity
        {
            if key_path.trim().is_empty() {
                return Err(VaultError::validation("keyIdentity.keyPath is missing"));
            }
            if key_version.trim().is_empty() {
                return Err(VaultError::validation("keyIdentity.keyVersion is missing"));
            }
        }

        Ok(DecodedEnvelope {
            ciphertext,
            wrapped_key,
            iv,
            auth_tag,
        })
    }
}

fn decode_field(name: &str, value: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|_| VaultError::validation(format!("{} is not valid base64", name)))
}
