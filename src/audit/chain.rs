//! Tamper-evident audit chain
//!
//! Each tenant has its own stream. Appending hashes the new entry together
//! with the stream's tail hash and advances the tail, so altering, removing,
//! duplicating or reordering any entry breaks verification from that point on.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::Serialize;

use super::entry::{AuditDraft, AuditEntry};
use super::hash::{compute_integrity_hash, GENESIS_HASH};
use crate::error::{VaultError, VaultResult};

/// Outcome of walking a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub is_valid: bool,
    pub first_broken_index: Option<usize>,
    pub entries_checked: usize,
}

impl ChainVerification {
    fn valid(entries_checked: usize) -> Self {
        Self {
            is_valid: true,
            first_broken_index: None,
            entries_checked,
        }
    }

    fn broken_at(index: usize) -> Self {
        Self {
            is_valid: false,
            first_broken_index: Some(index),
            entries_checked: index + 1,
        }
    }
}

/// Recompute an entry's hash against `previous_hash` and compare
pub fn verify_entry(entry: &AuditEntry, previous_hash: &str) -> bool {
    match compute_integrity_hash(entry, previous_hash) {
        Ok(hash) => hash == entry.integrity_hash(),
        Err(_) => false,
    }
}

/// Verify one stream, in order, starting from the genesis hash
///
/// Stops at the first entry whose hash does not match; nothing after it is
/// trusted.
pub fn verify_chain(entries: &[AuditEntry]) -> ChainVerification {
    let mut previous = GENESIS_HASH;
    for (index, entry) in entries.iter().enumerate() {
        if !verify_entry(entry, previous) {
            tracing::warn!(
                index,
                entry_id = %entry.id,
                tenant_id = entry.tenant_id(),
                "audit chain broken"
            );
            return ChainVerification::broken_at(index);
        }
        previous = entry.integrity_hash();
    }
    ChainVerification::valid(entries.len())
}

/// Split a mixed ledger into tenant streams (keeping order) and verify each
pub fn verify_by_tenant(entries: &[AuditEntry]) -> BTreeMap<String, ChainVerification> {
    group_by_tenant(entries)
        .into_iter()
        .map(|(tenant, stream)| {
            let owned: Vec<AuditEntry> = stream.into_iter().cloned().collect();
            (tenant, verify_chain(&owned))
        })
        .collect()
}

fn group_by_tenant(entries: &[AuditEntry]) -> BTreeMap<String, Vec<&AuditEntry>> {
    let mut streams: BTreeMap<String, Vec<&AuditEntry>> = BTreeMap::new();
    for entry in entries {
        streams
            .entry(entry.tenant_id().to_string())
            .or_default()
            .push(entry);
    }
    streams
}

/// Append-only ledger of per-tenant hash chains
///
/// Only the tail hash of each stream is kept; entries themselves are handed
/// back to the caller for persistence.
#[derive(Debug, Default)]
pub struct AuditChain {
    tails: Mutex<HashMap<String, String>>,
}

impl AuditChain {
    /// An empty chain; every stream starts at the genesis hash
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild stream tails from a persisted ledger
    ///
    /// # Errors
    ///
    /// Returns an integrity error naming the tenant and position if any
    /// stream fails verification.
    pub fn resume(entries: &[AuditEntry]) -> VaultResult<Self> {
        let mut tails = HashMap::new();

        for (tenant, stream) in group_by_tenant(entries) {
            let owned: Vec<AuditEntry> = stream.into_iter().cloned().collect();
            let result = verify_chain(&owned);
            if let Some(index) = result.first_broken_index {
                return Err(VaultError::integrity(format!(
                    "audit stream '{}' is broken at entry {}",
                    tenant, index
                )));
            }
            if let Some(last) = owned.last() {
                tails.insert(tenant, last.integrity_hash().to_string());
            }
        }

        tracing::debug!(streams = tails.len(), "audit chain resumed");
        Ok(Self {
            tails: Mutex::new(tails),
        })
    }

    /// Current tail hash of a tenant stream
    pub fn tail(&self, tenant_id: &str) -> String {
        self.tails
            .lock()
            .get(tenant_id)
            .cloned()
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    /// Append a draft to its tenant stream
    pub fn append(&self, draft: AuditDraft) -> VaultResult<AuditEntry> {
        self.append_inner(draft, None, |_| Ok(()))
    }

    /// Append only if `claimed_previous_hash` is still the stream tail
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ChainConflict`] when another entry was appended
    /// after the caller read the tail.
    pub fn append_after(
        &self,
        draft: AuditDraft,
        claimed_previous_hash: &str,
    ) -> VaultResult<AuditEntry> {
        self.append_inner(draft, Some(claimed_previous_hash), |_| Ok(()))
    }

    /// Like [`append_after`](Self::append_after), but the tail only advances
    /// once `persist` has stored the new entry
    ///
    /// A failed `persist` leaves the stream exactly as it was.
    pub fn append_persisted<F>(
        &self,
        draft: AuditDraft,
        claimed_previous_hash: &str,
        persist: F,
    ) -> VaultResult<AuditEntry>
    where
        F: FnOnce(&AuditEntry) -> VaultResult<()>,
    {
        self.append_inner(draft, Some(claimed_previous_hash), persist)
    }

    /// Tail check, hash, persist and advance all happen under one lock
    fn append_inner<F>(
        &self,
        draft: AuditDraft,
        claimed: Option<&str>,
        persist: F,
    ) -> VaultResult<AuditEntry>
    where
        F: FnOnce(&AuditEntry) -> VaultResult<()>,
    {
        let mut entry = AuditEntry::from_draft(draft);
        let tenant_id = entry.tenant_id().to_string();

        let mut tails = self.tails.lock();
        let previous = tails
            .get(&tenant_id)
            .map(String::as_str)
            .unwrap_or(GENESIS_HASH);

        if let Some(claimed) = claimed {
            if claimed != previous {
                return Err(VaultError::ChainConflict {
                    tenant_id,
                    expected: previous.to_string(),
                    claimed: claimed.to_string(),
                });
            }
        }

        let hash = compute_integrity_hash(&entry, previous)?;
        entry.set_integrity_hash(hash.clone());
        persist(&entry)?;
        tails.insert(tenant_id, hash);
        drop(tails);

        tracing::debug!(
            entry_id = %entry.id,
            action = %entry.action,
            tenant_id = entry.tenant_id(),
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Verify a stream and also require that it ends at the tracked tail
    ///
    /// [`verify_chain`] alone cannot notice entries cut from the end of a
    /// stream. A truncated stream is reported broken at `entries.len()`.
    pub fn verify_against_tail(&self, tenant_id: &str, entries: &[AuditEntry]) -> ChainVerification {
        let result = verify_chain(entries);
        if !result.is_valid {
            return result;
        }

        let last = entries
            .last()
            .map(AuditEntry::integrity_hash)
            .unwrap_or(GENESIS_HASH);
        if last != self.tail(tenant_id) {
            tracing::warn!(tenant_id, "audit stream does not end at the recorded tail");
            return ChainVerification {
                is_valid: false,
                first_broken_index: Some(entries.len()),
                entries_checked: entries.len(),
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{Actor, AuditAction, Resource};
    use serde_json::json;

    fn draft(action: AuditAction, tenant: &str) -> AuditDraft {
        AuditDraft::new(
            action,
            Actor::new("user-1", "manager"),
            Resource::new("employee", "emp-9", tenant),
        )
    }

    #[test]
    fn test_first_entry_chains_from_genesis() {
        let chain = AuditChain::new();
        assert_eq!(chain.tail("t1"), GENESIS_HASH);

        let entry = chain.append(draft(AuditAction::Create, "t1")).unwrap();
        assert!(verify_entry(&entry, GENESIS_HASH));
        assert_eq!(chain.tail("t1"), entry.integrity_hash());
    }

    #[test]
    fn test_tampered_field_fails_verification() {
        let chain = AuditChain::new();
        let entry = chain
            .append(draft(AuditAction::Read, "t1").with_details(json!({"field": "salary"})))
            .unwrap();

        let mut altered = entry.clone();
        altered.details = json!({"field": "ssn"});
        assert!(!verify_entry(&altered, GENESIS_HASH));

        let mut altered = entry.clone();
        altered.timestamp = altered.timestamp + chrono::Duration::seconds(1);
        assert!(!verify_entry(&altered, GENESIS_HASH));

        assert!(!verify_entry(&entry, &"f".repeat(64)));
    }

    #[test]
    fn test_streams_are_independent() {
        let chain = AuditChain::new();
        let a1 = chain.append(draft(AuditAction::Create, "a")).unwrap();
        let b1 = chain.append(draft(AuditAction::Create, "b")).unwrap();
        let a2 = chain.append(draft(AuditAction::Update, "a")).unwrap();

        assert!(verify_entry(&b1, GENESIS_HASH));
        assert!(verify_entry(&a2, a1.integrity_hash()));

        let results = verify_by_tenant(&[a1, b1, a2]);
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| r.is_valid));
        assert_eq!(results["a"].entries_checked, 2);
    }

    #[test]
    fn test_append_after_rejects_stale_tail() {
        let chain = AuditChain::new();
        let tail = chain.tail("t1");
        chain.append_after(draft(AuditAction::Create, "t1"), &tail).unwrap();

        let err = chain
            .append_after(draft(AuditAction::Update, "t1"), &tail)
            .unwrap_err();
        assert!(matches!(err, VaultError::ChainConflict { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::ChainConflict);
    }

    #[test]
    fn test_failed_persist_leaves_tail_unchanged() {
        let chain = AuditChain::new();
        let first = chain.append(draft(AuditAction::Create, "t1")).unwrap();

        let err = chain
            .append_persisted(draft(AuditAction::Update, "t1"), first.integrity_hash(), |_| {
                Err(VaultError::Io("disk full".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, VaultError::Io(_)));
        assert_eq!(chain.tail("t1"), first.integrity_hash());

        let mut stored = Vec::new();
        let second = chain
            .append_persisted(draft(AuditAction::Update, "t1"), first.integrity_hash(), |entry| {
                stored.push(entry.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(stored, vec![second.clone()]);
        assert_eq!(chain.tail("t1"), second.integrity_hash());
        assert!(verify_chain(&[first, second]).is_valid);
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let result = verify_chain(&[]);
        assert!(result.is_valid);
        assert_eq!(result.entries_checked, 0);
    }

    #[test]
    fn test_truncation_detected_against_tail() {
        let chain = AuditChain::new();
        let entries: Vec<AuditEntry> = [AuditAction::Create, AuditAction::Update, AuditAction::Read]
            .into_iter()
            .map(|action| chain.append(draft(action, "t1")).unwrap())
            .collect();

        assert!(chain.verify_against_tail("t1", &entries).is_valid);

        let truncated = &entries[..2];
        assert!(verify_chain(truncated).is_valid);
        let result = chain.verify_against_tail("t1", truncated);
        assert!(!result.is_valid);
        assert_eq!(result.first_broken_index, Some(2));
    }
}
