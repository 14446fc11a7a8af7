//! On-disk storage for local key pairs
//!
//! A key pair named `tenant-a` is stored as two files:
//!
//! - `tenant-a.pub.pem`: the public key, plain SPKI PEM
//! - `tenant-a.key.json`: the PKCS#8 private key, AES-256-GCM encrypted under
//!   an Argon2id key derived from the operator's passphrase
//!
//! The private key never touches disk unencrypted.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::key_derivation::{derive_key, KeyDerivationParams};
use super::local_wrapper::{KeyPair, PrivateKey, PublicKey};
use super::symmetric::{self, NONCE_SIZE};
use crate::error::{VaultError, VaultResult};

const PUBLIC_SUFFIX: &str = ".pub.pem";
const PRIVATE_SUFFIX: &str = ".key.json";

/// Encrypted private key file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProtectedKeyFile {
    version: u8,
    kdf: KeyDerivationParams,
    iv: String,
    auth_tag: String,
    ciphertext: String,
    created_at: DateTime<Utc>,
}

/// Directory of passphrase-protected key pairs
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
}

impl KeyStore {
    /// Create a key store rooted at `dir` with default Argon2 costs
    pub fn new(dir: PathBuf) -> Self {
        let defaults = KeyDerivationParams::default();
        Self {
            dir,
            memory_cost: defaults.memory_cost,
            time_cost: defaults.time_cost,
            parallelism: defaults.parallelism,
        }
    }

    /// Override the Argon2 costs used for newly saved keys
    pub fn with_kdf_costs(mut self, memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        self.memory_cost = memory_cost;
        self.time_cost = time_cost;
        self.parallelism = parallelism;
        self
    }

    /// Directory holding the key files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check whether a key pair with this name exists
    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.private_path(name).exists()
    }

    /// Persist a key pair, refusing to overwrite an existing one
    pub fn save(&self, name: &str, pair: &KeyPair, passphrase: &str) -> VaultResult<()> {
        validate_name(name)?;
        if self.private_path(name).exists() {
            return Err(VaultError::validation(format!(
                "Key pair '{}' already exists",
                name
            )));
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| VaultError::Io(format!("Failed to create key directory: {}", e)))?;

        let params =
            KeyDerivationParams::with_costs(self.memory_cost, self.time_cost, self.parallelism);
        let file_key = derive_key(passphrase, &params)?;

        let private_pem = pair.private_key.to_pem()?;
        let sealed = symmetric::encrypt(private_pem.as_bytes(), &file_key)?;

        let file = ProtectedKeyFile {
            version: 1,
            kdf: params,
            iv: STANDARD.encode(sealed.iv),
            auth_tag: STANDARD.encode(sealed.auth_tag),
            ciphertext: STANDARD.encode(&sealed.ciphertext),
            created_at: Utc::now(),
        };

        let contents = serde_json::to_string_pretty(&file)
            .map_err(|e| VaultError::Json(format!("Failed to serialize key file: {}", e)))?;
        std::fs::write(self.private_path(name), contents)
            .map_err(|e| VaultError::Io(format!("Failed to write private key file: {}", e)))?;

        std::fs::write(self.public_path(name), pair.public_key.to_pem()?)
            .map_err(|e| VaultError::Io(format!("Failed to write public key file: {}", e)))?;

        tracing::info!(key = name, "stored local key pair");
        Ok(())
    }

    /// Load a public key
    pub fn load_public(&self, name: &str) -> VaultResult<PublicKey> {
        validate_name(name)?;
        let pem = std::fs::read_to_string(self.public_path(name))
            .map_err(|e| VaultError::Io(format!("Failed to read public key '{}': {}", name, e)))?;
        PublicKey::from_pem(&pem)
    }

    /// Decrypt and load a private key
    ///
    /// A wrong passphrase fails the authentication tag check and is reported
    /// as an integrity error.
    pub fn load_private(&self, name: &str, passphrase: &str) -> VaultResult<PrivateKey> {
        validate_name(name)?;
        let contents = std::fs::read_to_string(self.private_path(name))
            .map_err(|e| VaultError::Io(format!("Failed to read private key '{}': {}", name, e)))?;
        let file: ProtectedKeyFile = serde_json::from_str(&contents)
            .map_err(|e| VaultError::validation(format!("Malformed key file '{}': {}", name, e)))?;

        if file.version != 1 {
            return Err(VaultError::validation(format!(
                "Unsupported key file version: {}",
                file.version
            )));
        }

        let iv_bytes = decode_field("iv", &file.iv)?;
        let iv: [u8; NONCE_SIZE] = iv_bytes
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::validation("Key file IV has wrong length"))?;
        let auth_tag = decode_field("auth_tag", &file.auth_tag)?;
        let ciphertext = decode_field("ciphertext", &file.ciphertext)?;

        let file_key = derive_key(passphrase, &file.kdf)?;
        let pem = Zeroizing::new(
            symmetric::decrypt(&ciphertext, &file_key, &iv, &auth_tag).map_err(|_| {
                VaultError::integrity(format!(
                    "Could not decrypt key '{}': wrong passphrase or corrupted file",
                    name
                ))
            })?,
        );

        let pem = std::str::from_utf8(&pem)
            .map_err(|_| VaultError::validation("Private key is not valid UTF-8"))?;
        PrivateKey::from_pem(pem)
    }

    /// List the names of stored key pairs, sorted
    pub fn list(&self) -> VaultResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let file_name = entry?.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(PRIVATE_SUFFIX)) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn public_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, PUBLIC_SUFFIX))
    }

    fn private_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, PRIVATE_SUFFIX))
    }
}

fn validate_name(name: &str) -> VaultResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(VaultError::validation(format!(
            "Invalid key name '{}': use letters, digits, '-' or '_'",
            name
        )))
    }
}

fn decode_field(field: &str, value: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| VaultError::validation(format!("Invalid {} encoding: {}", field, e)))
}
