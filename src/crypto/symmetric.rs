//! AES-256-GCM encryption/decryption with one-time keys
//!
//! Every call to [`encrypt`] draws a fresh 96-bit IV, so an IV is never reused
//! with a key. The 128-bit authentication tag is kept detached from the
//! ciphertext so envelopes can carry it as its own field.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

/// Size of a symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// A one-time 256-bit data key
///
/// Zeroed on drop. Never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Build a key from raw bytes, rejecting anything that is not 32 bytes
    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(VaultError::Crypto(format!(
                "Invalid key length: expected {}, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Output of a single authenticated encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; NONCE_SIZE],
    pub auth_tag: [u8; TAG_SIZE],
}

/// Encrypt plaintext using AES-256-GCM
///
/// Generates a random IV for each encryption operation.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> VaultResult<SealedPayload> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Crypto(format!("Failed to create cipher: {}", e)))?;

    let mut iv = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|e| VaultError::Crypto(format!("Encryption failed: {}", e)))?;

    let mut auth_tag = [0u8; TAG_SIZE];
    auth_tag.copy_from_slice(tag.as_slice());

    Ok(SealedPayload {
        ciphertext: buffer,
        iv,
        auth_tag,
    })
}

/// Decrypt ciphertext using AES-256-GCM
///
/// The tag is checked by the AEAD primitive itself; on mismatch no plaintext
/// is released. A tag of the wrong length cannot verify and is reported the
/// same way.
pub fn decrypt(
    ciphertext: &[u8],
    key: &SymmetricKey,
    iv: &[u8; NONCE_SIZE],
    auth_tag: &[u8],
) -> VaultResult<Vec<u8>> {
    if auth_tag.len() != TAG_SIZE {
        tracing::warn!(tag_len = auth_tag.len(), "authentication tag has wrong length");
        return Err(VaultError::integrity("authentication tag mismatch"));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Crypto(format!("Failed to create cipher: {}", e)))?;

    let mut buffer = ciphertext.to_vec();
    if cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            &mut buffer,
            Tag::from_slice(auth_tag),
        )
        .is_err()
    {
        buffer.zeroize();
        tracing::warn!("authentication tag did not verify");
        return Err(VaultError::integrity("authentication tag mismatch"));
    }

    Ok(buffer)
}
