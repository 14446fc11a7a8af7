//! Audit ledger display formatting

use std::collections::BTreeMap;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::audit::{AuditEntry, ChainVerification};

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Time (UTC)")]
    time: String,
    #[tabled(rename = "Tenant")]
    tenant: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Hash")]
    hash: String,
}

impl From<&AuditEntry> for EntryRow {
    fn from(entry: &AuditEntry) -> Self {
        let hash = entry.integrity_hash();
        Self {
            time: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            tenant: entry.resource.tenant_id.clone(),
            action: entry.action.to_string(),
            severity: entry.severity.to_string(),
            actor: format!("{} ({})", entry.actor.user_id, entry.actor.role),
            resource: format!("{}/{}", entry.resource.resource_type, entry.resource.id),
            hash: hash.get(..12).unwrap_or(hash).to_string(),
        }
    }
}

/// Format entries as a table, oldest first
pub fn format_entry_table(entries: &[AuditEntry]) -> String {
    if entries.is_empty() {
        return "No audit entries found.".to_string();
    }

    let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
    Table::new(rows).with(Style::modern()).to_string()
}

/// Format per-tenant verification results
pub fn format_verification(results: &BTreeMap<String, ChainVerification>) -> String {
    if results.is_empty() {
        return "No audit entries to verify.".to_string();
    }

    let mut output = String::new();
    for (tenant, result) in results {
        match result.first_broken_index {
            None => output.push_str(&format!(
                "{}: OK ({} entries)\n",
                tenant, result.entries_checked
            )),
            Some(index) => output.push_str(&format!(
                "{}: BROKEN at entry {} (entries from this point are untrusted)\n",
                tenant, index
            )),
        }
    }
    output
}
