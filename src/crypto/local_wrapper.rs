//! Key wrapping with a locally-held RSA key pair
//!
//! Data keys are wrapped with RSA-OAEP (SHA-256). OAEP decoding fails closed
//! when the wrong private key is used, which surfaces as
//! [`VaultError::KeyMismatch`] rather than as garbage key bytes.

use aes_gcm::aead::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::symmetric::{SymmetricKey, KEY_SIZE};
use crate::error::{VaultError, VaultResult};

/// Supported RSA modulus sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "usize", into = "usize")]
pub enum KeySize {
    #[default]
    Rsa2048,
    Rsa4096,
}

impl KeySize {
    /// Modulus size in bits
    pub fn bits(self) -> usize {
        match self {
            KeySize::Rsa2048 => 2048,
            KeySize::Rsa4096 => 4096,
        }
    }
}

impl TryFrom<usize> for KeySize {
    type Error = VaultError;

    fn try_from(bits: usize) -> Result<Self, Self::Error> {
        match bits {
            2048 => Ok(KeySize::Rsa2048),
            4096 => Ok(KeySize::Rsa4096),
            other => Err(VaultError::validation(format!(
                "Unsupported key size {}: expected 2048 or 4096",
                other
            ))),
        }
    }
}

impl From<KeySize> for usize {
    fn from(size: KeySize) -> Self {
        size.bits()
    }
}

impl std::fmt::Display for KeySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RSA-{}", self.bits())
    }
}

/// Public half of a local key pair, safe to share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Export as SPKI PEM
    pub fn to_pem(&self) -> VaultResult<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| VaultError::Crypto(format!("Failed to encode public key: {}", e)))
    }

    /// Import from SPKI PEM
    pub fn from_pem(pem: &str) -> VaultResult<Self> {
        RsaPublicKey::from_public_key_pem(pem)
            .map(Self)
            .map_err(|e| VaultError::validation(format!("Invalid public key PEM: {}", e)))
    }
}

/// Private half of a local key pair
///
/// The inner RSA key zeroizes itself on drop.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Export as PKCS#8 PEM; the returned string is zeroed on drop
    pub fn to_pem(&self) -> VaultResult<Zeroizing<String>> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| VaultError::Crypto(format!("Failed to encode private key: {}", e)))
    }

    /// Import from PKCS#8 PEM
    pub fn from_pem(pem: &str) -> VaultResult<Self> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(Self)
            .map_err(|e| VaultError::validation(format!("Invalid private key PEM: {}", e)))
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// A local asymmetric key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// Generate a fresh RSA key pair
pub fn generate_key_pair(size: KeySize) -> VaultResult<KeyPair> {
    tracing::debug!(bits = size.bits(), "generating RSA key pair");
    let private = RsaPrivateKey::new(&mut OsRng, size.bits())
        .map_err(|e| VaultError::Crypto(format!("Key generation failed: {}", e)))?;
    let public = private.to_public_key();

    Ok(KeyPair {
        public_key: PublicKey(public),
        private_key: PrivateKey(private),
    })
}

/// Wrap a data key under a public key (RSA-OAEP, SHA-256)
pub fn wrap(key: &SymmetricKey, public_key: &PublicKey) -> VaultResult<Vec<u8>> {
    oaep_encrypt(public_key, key.as_bytes())
        .map_err(|e| VaultError::Crypto(format!("Key wrap failed: {}", e)))
}

/// Unwrap a data key with a private key
pub fn unwrap(wrapped_key: &[u8], private_key: &PrivateKey) -> VaultResult<SymmetricKey> {
    let recovered = oaep_decrypt(private_key, wrapped_key).map_err(|_| VaultError::KeyMismatch)?;

    if recovered.len() != KEY_SIZE {
        return Err(VaultError::KeyMismatch);
    }

    SymmetricKey::from_slice(&recovered)
}

pub(crate) fn oaep_encrypt(public_key: &PublicKey, data: &[u8]) -> Result<Vec<u8>, rsa::Error> {
    public_key
        .0
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
}

pub(crate) fn oaep_decrypt(
    private_key: &PrivateKey,
    data: &[u8],
) -> Result<Zeroizing<Vec<u8>>, rsa::Error> {
    private_key
        .0
        .decrypt(Oaep::new::<Sha256>(), data)
        .map(Zeroizing::new)
}
