//! The seam between this crate and a remote key custodian
//!
//! A custodian holds asymmetric private keys and performs encrypt/decrypt on
//! request; private key material never crosses this boundary.

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

/// Failures reported by a key custodian
///
/// The detail strings are for operator logs only and are never returned to
/// untrusted callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodianError {
    /// The custodian could not be reached or failed internally
    #[error("custodian unavailable: {0}")]
    Unavailable(String),

    /// The custodian is rate limiting this client
    #[error("custodian throttled the request")]
    Throttled,

    /// No such key path or key version
    #[error("key version not found: {key_path} version {key_version}")]
    KeyVersionNotFound {
        key_path: String,
        key_version: String,
    },

    /// The caller is not permitted to use this key
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The custodian refused the request as invalid
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The custodian answered with something we could not interpret
    #[error("malformed custodian response: {0}")]
    Malformed(String),
}

impl CustodianError {
    /// Transient failures are worth retrying; everything else is final
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Throttled)
    }
}

/// Result of a custodian encrypt call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodianCiphertext {
    pub ciphertext: Vec<u8>,
    /// The key version that actually performed the encryption
    pub key_version: String,
}

/// A remote service that holds private keys and wraps/unwraps on our behalf
#[async_trait]
pub trait KeyCustodian: Send + Sync {
    /// Asymmetric-encrypt `plaintext` under `key_path`, using `key_version` or
    /// the custodian's current primary version when `None`
    async fn encrypt(
        &self,
        key_path: &str,
        key_version: Option<&str>,
        plaintext: &[u8],
    ) -> Result<CustodianCiphertext, CustodianError>;

    /// Asymmetric-decrypt `ciphertext` with exactly `key_version` of `key_path`
    async fn decrypt(
        &self,
        key_path: &str,
        key_version: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CustodianError>;

    /// Lightweight liveness probe
    async fn health_check(&self) -> Result<(), CustodianError>;
}
