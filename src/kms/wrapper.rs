//! Data-key wrapping through a remote key custodian
//!
//! Shapes requests for a [`KeyCustodian`] and records which key path and
//! version wrapped each data key, so envelopes stay decryptable after the
//! custodian rotates to a newer primary version.

use std::sync::Arc;
use std::time::Duration;

use super::custodian::{CustodianError, KeyCustodian};
use super::http::HttpCustodian;
use super::retry::{with_retry, RetryPolicy};
use crate::config::Settings;
use crate::crypto::symmetric::{SymmetricKey, KEY_SIZE};
use crate::error::{VaultError, VaultResult};

/// A data key wrapped by the custodian, with the key identity that wrapped it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWrap {
    pub wrapped_key: Vec<u8>,
    pub key_path: String,
    pub key_version: String,
}

/// Wraps and unwraps data keys via a remote custodian
#[derive(Clone)]
pub struct RemoteKeyWrapper {
    custodian: Arc<dyn KeyCustodian>,
    key_path: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RemoteKeyWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteKeyWrapper")
            .field("key_path", &self.key_path)
            .field("retry", &self.retry)
            .finish()
    }
}

impl RemoteKeyWrapper {
    /// Wrap keys under `key_path` held by `custodian`
    pub fn new(custodian: Arc<dyn KeyCustodian>, key_path: impl Into<String>) -> Self {
        Self {
            custodian,
            key_path: key_path.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used for transient failures
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build an HTTP-backed wrapper from settings, if a KMS endpoint is configured
    pub fn from_settings(settings: &Settings) -> VaultResult<Option<Self>> {
        let Some(endpoint) = settings.kms.endpoint.as_deref() else {
            return Ok(None);
        };

        let mut custodian =
            HttpCustodian::new(endpoint, Duration::from_millis(settings.kms.timeout_ms))?;
        if let Ok(token) = std::env::var(&settings.kms.token_env) {
            custodian = custodian.with_token(token);
        }

        Ok(Some(
            Self::new(Arc::new(custodian), settings.kms.key_path.clone())
                .with_retry_policy(settings.retry.to_policy()),
        ))
    }

    /// Key path new data keys are wrapped under
    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    /// Wrap a data key; `key_version` of `None` lets the custodian pick its
    /// current primary version
    pub async fn wrap(
        &self,
        key: &SymmetricKey,
        key_version: Option<&str>,
    ) -> VaultResult<RemoteWrap> {
        let key_path = self.key_path.as_str();
        let result = with_retry(&self.retry, "wrap", || {
            self.custodian.encrypt(key_path, key_version, key.as_bytes())
        })
        .await
        .map_err(|e| map_custodian_error(e, key_path, key_version.unwrap_or("primary")))?;

        tracing::debug!(key_path, key_version = %result.key_version, "data key wrapped remotely");
        Ok(RemoteWrap {
            wrapped_key: result.ciphertext,
            key_path: key_path.to_string(),
            key_version: result.key_version,
        })
    }

    /// Unwrap a data key with the exact key version that wrapped it
    pub async fn unwrap(
        &self,
        wrapped_key: &[u8],
        key_path: &str,
        key_version: &str,
    ) -> VaultResult<SymmetricKey> {
        let recovered = with_retry(&self.retry, "unwrap", || {
            self.custodian.decrypt(key_path, key_version, wrapped_key)
        })
        .await
        .map_err(|e| map_custodian_error(e, key_path, key_version))?;

        if recovered.len() != KEY_SIZE {
            tracing::warn!(key_path, key_version, "custodian returned a key of unexpected length");
            return Err(VaultError::integrity("unwrapped key has unexpected length"));
        }

        SymmetricKey::from_slice(&recovered)
    }

    /// Probe custodian availability before a batch of operations
    pub async fn health_check(&self) -> VaultResult<()> {
        self.custodian
            .health_check()
            .await
            .map_err(|e| map_custodian_error(e, &self.key_path, "-"))
    }
}

/// Reduce custodian detail to a stable, generic error
fn map_custodian_error(err: CustodianError, key_path: &str, key_version: &str) -> VaultError {
    tracing::debug!(key_path, key_version, error = %err, "key custodian call failed");
    match err {
        CustodianError::Unavailable(_) | CustodianError::Throttled => {
            VaultError::KeyManagementUnavailable
        }
        CustodianError::KeyVersionNotFound { .. } => VaultError::KeyVersionNotFound {
            key_path: key_path.to_string(),
            key_version: key_version.to_string(),
        },
        CustodianError::AccessDenied(_) => VaultError::AccessDenied,
        CustodianError::Rejected(_) | CustodianError::Malformed(_) => {
            VaultError::Crypto("key custodian could not complete the request".to_string())
        }
    }
}
