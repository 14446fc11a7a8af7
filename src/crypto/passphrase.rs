//! Passphrases for key files
//!
//! Held in a wrapper that is wiped on drop and never printed.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

/// Minimum length accepted when protecting a new key file
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// A key-file passphrase, zeroed on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Reject passphrases too short to protect a new key file
    pub fn check_strength(&self) -> VaultResult<()> {
        if self.0.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(VaultError::validation(format!(
                "Passphrase must be at least {} characters",
                MIN_PASSPHRASE_LEN
            )));
        }
        Ok(())
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Passphrase([REDACTED])")
    }
}
