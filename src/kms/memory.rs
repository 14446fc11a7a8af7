//! In-process key custodian
//!
//! Holds versioned RSA key pairs per key path and behaves like a remote KMS:
//! callers only ever see ciphertext and plaintext data keys, never the private
//! keys. Supports rotation, disabling versions, access denial and transient
//! fault injection so failure handling can be exercised without a network.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use zeroize::Zeroizing;

use super::custodian::{CustodianCiphertext, CustodianError, KeyCustodian};
use crate::crypto::local_wrapper::{self, generate_key_pair, KeyPair, KeySize};
use crate::error::VaultResult;

struct KeyVersion {
    pair: KeyPair,
    enabled: bool,
}

#[derive(Default)]
struct KeyRing {
    versions: BTreeMap<u32, KeyVersion>,
    primary: u32,
}

#[derive(Default)]
struct CustodianState {
    keys: HashMap<String, KeyRing>,
    denied: HashSet<String>,
    pending_faults: u32,
    unhealthy: bool,
    calls: u64,
}

/// A key custodian living in this process
pub struct InMemoryCustodian {
    key_size: KeySize,
    state: Mutex<CustodianState>,
}

impl Default for InMemoryCustodian {
    fn default() -> Self {
        Self::new(KeySize::Rsa2048)
    }
}

impl InMemoryCustodian {
    /// Create an empty custodian that generates keys of the given size
    pub fn new(key_size: KeySize) -> Self {
        Self {
            key_size,
            state: Mutex::new(CustodianState::default()),
        }
    }

    /// Create the first version of a key; returns the new version
    ///
    /// If the key path already exists this behaves like [`Self::rotate`].
    pub fn create_key(&self, key_path: &str) -> VaultResult<String> {
        self.rotate(key_path)
    }

    /// Add a new primary version to a key path; older versions stay usable
    pub fn rotate(&self, key_path: &str) -> VaultResult<String> {
        // Generate outside the lock; RSA key generation is slow.
        let pair = generate_key_pair(self.key_size)?;

        let mut state = self.state.lock();
        let ring = state.keys.entry(key_path.to_string()).or_default();
        let version = ring.versions.keys().next_back().copied().unwrap_or(0) + 1;
        ring.versions.insert(
            version,
            KeyVersion {
                pair,
                enabled: true,
            },
        );
        ring.primary = version;

        tracing::info!(key_path, version, "custodian key version created");
        Ok(version.to_string())
    }

    /// Disable a key version; it can no longer encrypt or decrypt
    pub fn disable_version(&self, key_path: &str, key_version: &str) -> bool {
        let mut state = self.state.lock();
        let Some(version) = key_version.parse::<u32>().ok() else {
            return false;
        };
        match state
            .keys
            .get_mut(key_path)
            .and_then(|ring| ring.versions.get_mut(&version))
        {
            Some(entry) => {
                entry.enabled = false;
                true
            }
            None => false,
        }
    }

    /// Refuse every operation on a key path
    pub fn deny(&self, key_path: &str) {
        self.state.lock().denied.insert(key_path.to_string());
    }

    /// Fail the next `count` operations with a transient error
    pub fn inject_transient_failures(&self, count: u32) {
        self.state.lock().pending_faults = count;
    }

    /// Make the liveness probe fail or succeed
    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().unhealthy = !healthy;
    }

    /// Number of encrypt/decrypt/health calls received so far
    pub fn call_count(&self) -> u64 {
        self.state.lock().calls
    }

    /// Current primary version of a key path
    pub fn primary_version(&self, key_path: &str) -> Option<String> {
        self.state
            .lock()
            .keys
            .get(key_path)
            .map(|ring| ring.primary.to_string())
    }

    /// Count the call, apply injected faults and access checks, and return a
    /// clone of the requested key version
    fn select_key(
        &self,
        key_path: &str,
        key_version: Option<&str>,
    ) -> Result<(KeyPair, String), CustodianError> {
        let mut state = self.state.lock();
        state.calls += 1;

        if state.pending_faults > 0 {
            state.pending_faults -= 1;
            return Err(CustodianError::Unavailable("injected fault".to_string()));
        }
        if state.unhealthy {
            return Err(CustodianError::Unavailable("custodian is down".to_string()));
        }
        if state.denied.contains(key_path) {
            return Err(CustodianError::AccessDenied(format!(
                "caller may not use {}",
                key_path
            )));
        }

        let requested = key_version.unwrap_or("primary").to_string();
        let not_found = || CustodianError::KeyVersionNotFound {
            key_path: key_path.to_string(),
            key_version: requested.clone(),
        };

        let ring = state.keys.get(key_path).ok_or_else(not_found)?;
        let version = match key_version {
            Some(v) => v.parse::<u32>().map_err(|_| not_found())?,
            None => ring.primary,
        };
        let entry = ring.versions.get(&version).ok_or_else(not_found)?;
        if !entry.enabled {
            return Err(not_found());
        }

        Ok((entry.pair.clone(), version.to_string()))
    }
}

#[async_trait]
impl KeyCustodian for InMemoryCustodian {
    async fn encrypt(
        &self,
        key_path: &str,
        key_version: Option<&str>,
        plaintext: &[u8],
    ) -> Result<CustodianCiphertext, CustodianError> {
        let (pair, version) = self.select_key(key_path, key_version)?;
        let ciphertext = local_wrapper::oaep_encrypt(&pair.public_key, plaintext)
            .map_err(|e| CustodianError::Rejected(format!("encrypt failed: {}", e)))?;

        Ok(CustodianCiphertext {
            ciphertext,
            key_version: version,
        })
    }

    async fn decrypt(
        &self,
        key_path: &str,
        key_version: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CustodianError> {
        let (pair, _) = self.select_key(key_path, Some(key_version))?;
        local_wrapper::oaep_decrypt(&pair.private_key, ciphertext)
            .map_err(|_| CustodianError::Rejected("decryption failed".to_string()))
    }

    async fn health_check(&self) -> Result<(), CustodianError> {
        let mut state = self.state.lock();
        state.calls += 1;
        if state.unhealthy {
            return Err(CustodianError::Unavailable("custodian is down".to_string()));
        }
        Ok(())
    }
}
