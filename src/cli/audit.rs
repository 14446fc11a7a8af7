//! Audit ledger CLI commands

use clap::Subcommand;

use super::AuditLedger;
use crate::audit::{verify_by_tenant, Actor, AuditDraft, AuditLogger, Resource, Severity};
use crate::config::VaultPaths;
use crate::display::{format_entry_table, format_verification};
use crate::error::{VaultError, VaultResult};

/// Audit subcommands
#[derive(Subcommand)]
pub enum AuditCommands {
    /// Append an entry to a tenant's stream
    Append {
        /// Tenant whose stream receives the entry
        #[arg(long)]
        tenant: String,
        /// Acting user id
        #[arg(long)]
        user: String,
        /// Acting user's role
        #[arg(long)]
        role: String,
        /// Resource type (e.g. employee, document)
        #[arg(long)]
        resource_type: String,
        /// Resource id
        #[arg(long)]
        resource_id: String,
        /// Action name (CREATE, READ, UPDATE, DELETE, decrypt, ...)
        #[arg(long)]
        action: String,
        /// Severity: info, warning or critical
        #[arg(long, default_value = "info")]
        severity: Severity,
        /// Details as a JSON value
        #[arg(long)]
        details: Option<String>,
    },

    /// Verify every stream in the ledger
    Verify {
        /// Only verify this tenant's stream
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Show ledger entries
    Show {
        /// Only show this tenant's stream
        #[arg(long)]
        tenant: Option<String>,
        /// Only show the most recent N entries
        #[arg(long)]
        recent: Option<usize>,
    },
}

/// Handle audit commands
pub fn handle_audit_command(paths: &VaultPaths, cmd: AuditCommands) -> VaultResult<()> {
    match cmd {
        AuditCommands::Append {
            tenant,
            user,
            role,
            resource_type,
            resource_id,
            action,
            severity,
            details,
        } => {
            let details = match details {
                Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                    VaultError::validation(format!("--details is not valid JSON: {}", e))
                })?,
                None => serde_json::Value::Object(serde_json::Map::new()),
            };

            let ledger = AuditLedger::open(paths)?;
            let entry = ledger.record(
                AuditDraft::new(
                    action.as_str(),
                    Actor::new(user, role),
                    Resource::new(resource_type, resource_id, tenant),
                )
                .with_severity(severity)
                .with_details(details),
            )?;

            println!("{}", entry.format_human_readable());
            println!("  Hash: {}", entry.integrity_hash());
            Ok(())
        }
        AuditCommands::Verify { tenant } => {
            let logger = AuditLogger::new(paths.audit_log());
            let entries = match &tenant {
                Some(t) => logger.read_stream(t)?,
                None => logger.read_all()?,
            };

            let results = verify_by_tenant(&entries);
            print!("{}", format_verification(&results));

            if let Some((tenant, result)) = results.iter().find(|(_, r)| !r.is_valid) {
                return Err(VaultError::integrity(format!(
                    "audit stream '{}' is broken at entry {}",
                    tenant,
                    result.first_broken_index.unwrap_or(0)
                )));
            }
            Ok(())
        }
        AuditCommands::Show { tenant, recent } => {
            let logger = AuditLogger::new(paths.audit_log());
            let mut entries = match &tenant {
                Some(t) => logger.read_stream(t)?,
                None => logger.read_all()?,
            };
            if let Some(count) = recent {
                let start = entries.len().saturating_sub(count);
                entries.drain(..start);
            }

            println!("{}", format_entry_table(&entries));
            Ok(())
        }
    }
}
