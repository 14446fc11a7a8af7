//! Path management for the vault
//!
//! ## Path Resolution Order
//!
//! 1. `COMPLIANCE_VAULT_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/compliance-vault` or `~/.config/compliance-vault`
//! 3. Windows: `%APPDATA%\compliance-vault`

use std::path::PathBuf;

use crate::error::VaultError;

/// Environment variable overriding the base directory
pub const DIR_ENV_VAR: &str = "COMPLIANCE_VAULT_DIR";

/// Manages all paths used by the vault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    base_dir: PathBuf,
}

impl VaultPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = if let Ok(custom) = std::env::var(DIR_ENV_VAR) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create VaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the audit ledger
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Get the directory holding local key pairs
    pub fn keys_dir(&self) -> PathBuf {
        self.base_dir.join("keys")
    }

    /// Ensure the base and key directories exist
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.keys_dir())
            .map_err(|e| VaultError::Io(format!("Failed to create key directory: {}", e)))?;

        Ok(())
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").map_err(|_| {
                VaultError::Config("Could not determine HOME directory".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("compliance-vault"))
}

#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| VaultError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("compliance-vault"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.keys_dir(), temp_dir.path().join("keys"));
        assert_eq!(paths.audit_log(), temp_dir.path().join("audit.log"));
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();

        assert!(paths.base_dir().exists());
        assert!(paths.keys_dir().exists());
    }
}
