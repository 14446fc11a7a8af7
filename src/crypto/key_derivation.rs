//! Passphrase key derivation using Argon2id
//!
//! Derives the key that protects private key files at rest.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, Params,
};
use serde::{Deserialize, Serialize};

use super::symmetric::{SymmetricKey, KEY_SIZE};
use crate::error::{VaultError, VaultResult};

/// Parameters for key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// Salt for key derivation (base64 encoded)
    pub salt: String,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism degree (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            salt: String::new(),
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    /// Create new params with a random salt
    pub fn new() -> Self {
        Self::with_costs(
            Self::default().memory_cost,
            Self::default().time_cost,
            Self::default().parallelism,
        )
    }

    /// Create params with a random salt and explicit costs
    pub fn with_costs(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        let salt = SaltString::generate(&mut OsRng);
        Self {
            salt: salt.to_string(),
            memory_cost,
            time_cost,
            parallelism,
        }
    }
}

/// Derive a 256-bit key from a passphrase
pub fn derive_key(passphrase: &str, params: &KeyDerivationParams) -> VaultResult<SymmetricKey> {
    let salt = SaltString::from_b64(&params.salt)
        .map_err(|e| VaultError::validation(format!("Invalid salt: {}", e)))?;

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| VaultError::validation(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| VaultError::Crypto(format!("Key derivation failed: {}", e)))?;

    let hash_output = hash
        .hash
        .ok_or_else(|| VaultError::Crypto("No hash output generated".to_string()))?;

    let hash_bytes = hash_output.as_bytes();
    if hash_bytes.len() < KEY_SIZE {
        return Err(VaultError::Crypto(
            "Hash output too short for AES-256 key".to_string(),
        ));
    }

    SymmetricKey::from_slice(&hash_bytes[..KEY_SIZE])
}
