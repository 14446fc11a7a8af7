//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the library layer.

pub mod audit;
pub mod keys;
pub mod seal;

pub use audit::{handle_audit_command, AuditCommands};
pub use keys::{handle_keygen, handle_key_list, KeygenArgs};
pub use seal::{handle_open, handle_seal, OpenArgs, SealArgs};

use std::io::{Read, Write};
use std::path::Path;

use clap::Args;

use crate::audit::{Actor, AuditChain, AuditDraft, AuditEntry, AuditLogger, Resource};
use crate::config::{Settings, VaultPaths};
use crate::crypto::passphrase::MIN_PASSPHRASE_LEN;
use crate::crypto::{KeyStore, Passphrase};
use crate::error::{VaultError, VaultResult};

/// Passphrase for a stored key pair
#[derive(Args, Clone, Default)]
pub struct PassphraseArgs {
    /// Key passphrase (prompted when omitted)
    #[arg(long, env = "VAULT_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,
}

impl PassphraseArgs {
    /// Use the supplied passphrase or prompt for one
    pub fn resolve(&self, confirm: bool) -> VaultResult<Passphrase> {
        if let Some(passphrase) = &self.passphrase {
            return Ok(Passphrase::new(passphrase.as_str()));
        }
        if confirm {
            prompt_new_passphrase()
        } else {
            prompt_passphrase("Enter key passphrase: ")
        }
    }
}

/// Who is acting, recorded in audit entries written by seal and open
#[derive(Args, Debug, Clone)]
pub struct AuditContextArgs {
    /// Tenant whose audit stream records the operation
    #[arg(long, default_value = "default")]
    pub tenant: String,

    /// Acting user id
    #[arg(long, env = "USER", default_value = "operator")]
    pub user: String,

    /// Acting user's role
    #[arg(long, default_value = "operator")]
    pub role: String,
}

impl AuditContextArgs {
    fn actor(&self) -> Actor {
        Actor::new(self.user.clone(), self.role.clone())
    }

    fn resource(&self, resource_id: &str) -> Resource {
        Resource::new("file", resource_id, self.tenant.clone())
    }
}

/// The on-disk audit ledger
///
/// Every append re-reads the ledger under its file lock and chains from the
/// tail found on disk, so concurrent `vault` processes never fork a stream.
pub struct AuditLedger {
    logger: AuditLogger,
}

impl AuditLedger {
    /// Open the ledger, refusing to continue a tampered one
    pub fn open(paths: &VaultPaths) -> VaultResult<Self> {
        paths.ensure_directories()?;
        let logger = AuditLogger::new(paths.audit_log());
        logger.with_exclusive(|ledger| AuditChain::resume(&ledger.read_all()?))?;
        Ok(Self { logger })
    }

    /// Append a draft to its stream and persist it
    pub fn record(&self, draft: AuditDraft) -> VaultResult<AuditEntry> {
        self.logger.with_exclusive(|ledger| {
            let chain = AuditChain::resume(&ledger.read_all()?)?;
            let tail = chain.tail(&draft.resource.tenant_id);
            chain.append_persisted(draft, &tail, |entry| {
                ledger.append(std::slice::from_ref(entry))
            })
        })
    }
}

/// Key store configured with the settings' KDF costs
pub fn key_store(paths: &VaultPaths, settings: &Settings) -> KeyStore {
    KeyStore::new(paths.keys_dir()).with_kdf_costs(
        settings.local.kdf_memory_cost,
        settings.local.kdf_time_cost,
        settings.local.kdf_parallelism,
    )
}

/// Read a file, or stdin when no path is given
pub(crate) fn read_input(input: Option<&Path>) -> VaultResult<Vec<u8>> {
    match input {
        Some(path) => std::fs::read(path).map_err(|e| {
            VaultError::Io(format!("Failed to read {}: {}", path.display(), e))
        }),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            Ok(buffer)
        }
    }
}

/// Write to a file, or stdout when no path is given
pub(crate) fn write_output(output: Option<&Path>, data: &[u8]) -> VaultResult<()> {
    match output {
        Some(path) => std::fs::write(path, data).map_err(|e| {
            VaultError::Io(format!("Failed to write {}: {}", path.display(), e))
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Prompt for a new passphrase with confirmation
fn prompt_new_passphrase() -> VaultResult<Passphrase> {
    loop {
        let pass1 = prompt_passphrase("Enter new passphrase: ")?;

        if pass1.check_strength().is_err() {
            eprintln!(
                "Passphrase must be at least {} characters. Please try again.",
                MIN_PASSPHRASE_LEN
            );
            continue;
        }

        let pass2 = prompt_passphrase("Confirm passphrase: ")?;

        if pass1.expose() != pass2.expose() {
            eprintln!("Passphrases do not match. Please try again.");
            continue;
        }

        return Ok(pass1);
    }
}

/// Prompt for a passphrase (hidden input)
fn prompt_passphrase(prompt: &str) -> VaultResult<Passphrase> {
    rpassword::prompt_password(prompt)
        .map(Passphrase::from)
        .map_err(|e| VaultError::Io(format!("Failed to read passphrase: {}", e)))
}
