//! Vault settings
//!
//! Remote custodian location, retry behavior, and local key parameters,
//! persisted as JSON next to the audit ledger.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::VaultPaths;
use crate::crypto::local_wrapper::KeySize;
use crate::error::VaultError;
use crate::kms::retry::RetryPolicy;

/// Remote key custodian settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmsSettings {
    /// Base URL of the custodian; remote mode is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Key path new data keys are wrapped under
    #[serde(default = "default_key_path")]
    pub key_path: String,

    /// Version to wrap under; the custodian's primary when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_key_version: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for KmsSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            key_path: default_key_path(),
            default_key_version: None,
            timeout_ms: default_timeout_ms(),
            token_env: default_token_env(),
        }
    }
}

/// Upper bound on attempts per custodian call, whatever the file says
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Retry settings for transient custodian failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    /// Convert to a retry policy, clamping attempts to `1..=MAX_RETRY_ATTEMPTS`
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.clamp(1, MAX_RETRY_ATTEMPTS),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Local key pair settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalKeySettings {
    /// RSA modulus size for new key pairs
    #[serde(default)]
    pub key_bits: KeySize,

    /// Argon2 memory cost (KiB) protecting key files
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2 iterations protecting key files
    #[serde(default = "default_kdf_time_cost")]
    pub kdf_time_cost: u32,

    /// Argon2 parallelism protecting key files
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for LocalKeySettings {
    fn default() -> Self {
        Self {
            key_bits: KeySize::default(),
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_time_cost: default_kdf_time_cost(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

/// Vault settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub kms: KmsSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub local: LocalKeySettings,
}

fn default_schema_version() -> u32 {
    1
}

fn default_key_path() -> String {
    "compliance/documents".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_token_env() -> String {
    "VAULT_KMS_TOKEN".to_string()
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_time_cost() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            kms: KmsSettings::default(),
            retry: RetrySettings::default(),
            local: LocalKeySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &VaultPaths) -> Result<Self, VaultError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| VaultError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                VaultError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &VaultPaths) -> Result<(), VaultError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| VaultError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
