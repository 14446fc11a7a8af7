//! Error types for the data-protection core
//!
//! Every failure carries a stable [`ErrorKind`] so callers can tell "bad input"
//! apart from "tampering detected" without parsing messages. Remote custody
//! failures carry only generic text; custodian detail is logged, not returned.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Malformed envelope, missing field, or otherwise invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication tag or audit hash did not verify
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// A local private key could not unwrap the wrapped key
    #[error("Key mismatch: the supplied private key cannot unwrap this envelope")]
    KeyMismatch,

    /// Transient key custodian failure (retryable)
    #[error("Key management service unavailable")]
    KeyManagementUnavailable,

    /// The custodian does not know the requested key version
    #[error("Key version not found: {key_path} version {key_version}")]
    KeyVersionNotFound {
        key_path: String,
        key_version: String,
    },

    /// The custodian refused the operation
    #[error("Access denied by key management service")]
    AccessDenied,

    /// An append claimed a predecessor that is not the stream tail
    #[error("Audit chain conflict for tenant '{tenant_id}': expected previous hash {expected}, got {claimed}")]
    ChainConflict {
        tenant_id: String,
        expected: String,
        claimed: String,
    },

    /// Internal cryptographic failure that is neither tampering nor bad input
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

/// Stable error classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Integrity,
    KeyMismatch,
    KeyManagementUnavailable,
    KeyVersionNotFound,
    AccessDenied,
    ChainConflict,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Integrity => "integrity_error",
            ErrorKind::KeyMismatch => "key_mismatch",
            ErrorKind::KeyManagementUnavailable => "key_management_unavailable",
            ErrorKind::KeyVersionNotFound => "key_version_not_found",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::ChainConflict => "chain_conflict",
            ErrorKind::Internal => "internal_error",
        };
        write!(f, "{}", name)
    }
}

impl VaultError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::KeyMismatch => ErrorKind::KeyMismatch,
            Self::KeyManagementUnavailable => ErrorKind::KeyManagementUnavailable,
            Self::KeyVersionNotFound { .. } => ErrorKind::KeyVersionNotFound,
            Self::AccessDenied => ErrorKind::AccessDenied,
            Self::ChainConflict { .. } => ErrorKind::ChainConflict,
            Self::Crypto(_) | Self::Config(_) | Self::Io(_) | Self::Json(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Only transient custodian failures may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KeyManagementUnavailable)
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is an integrity error
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_kinds_are_distinct() {
        assert_eq!(VaultError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(VaultError::integrity("x").kind(), ErrorKind::Integrity);
        assert_ne!(
            VaultError::validation("x").kind(),
            VaultError::integrity("x").kind()
        );
        assert_eq!(VaultError::Io("disk".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(VaultError::KeyManagementUnavailable.is_retryable());
        assert!(!VaultError::AccessDenied.is_retryable());
        assert!(!VaultError::KeyVersionNotFound {
            key_path: "tenants/acme".into(),
            key_version: "7".into(),
        }
        .is_retryable());
        assert!(!VaultError::KeyMismatch.is_retryable());
    }

    #[test]
    fn test_remote_messages_are_generic() {
        assert_eq!(
            VaultError::AccessDenied.to_string(),
            "Access denied by key management service"
        );
        assert_eq!(
            VaultError::KeyManagementUnavailable.to_string(),
            "Key management service unavailable"
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::KeyVersionNotFound).unwrap();
        assert_eq!(json, "\"key_version_not_found\"");
        assert_eq!(ErrorKind::Integrity.to_string(), "integrity_error");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let vault_err: VaultError = io_err.into();
        assert!(matches!(vault_err, VaultError::Io(_)));
    }
}
