//! Canonical serialization and hashing of audit entries
//!
//! `integrityHash = hex(SHA-256(canonical_json(entry - integrityHash) || previous_hash))`
//! where `previous_hash` is the lowercase hex hash of the previous entry in
//! the tenant stream (as ASCII), or [`GENESIS_HASH`] for the first entry.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::entry::AuditEntry;
use crate::error::{VaultError, VaultResult};

/// Previous hash of the first entry in every stream
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

const HASH_FIELD: &str = "integrityHash";

/// Compact JSON with object keys sorted at every level
pub fn canonical_json(value: &Value) -> VaultResult<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(VaultError::validation("non-finite number in audit entry"));
                }
            }
            Ok(n.to_string())
        }
        Value::String(s) => Ok(serde_json::to_string(s)?),
        Value::Array(items) => {
            let items: VaultResult<Vec<String>> = items.iter().map(canonical_json).collect();
            Ok(format!("[{}]", items?.join(",")))
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let pairs: VaultResult<Vec<String>> = keys
                .iter()
                .map(|k| -> VaultResult<String> {
                    Ok(format!("{}:{}", serde_json::to_string(*k)?, canonical_json(&obj[*k])?))
                })
                .collect();
            Ok(format!("{{{}}}", pairs?.join(",")))
        }
    }
}

/// Canonical form of an entry with its hash field removed
pub fn canonicalize(entry: &AuditEntry) -> VaultResult<String> {
    let mut value = serde_json::to_value(entry)?;
    if let Value::Object(obj) = &mut value {
        obj.remove(HASH_FIELD);
    }
    canonical_json(&value)
}

/// Hash an entry's content chained to `previous_hash`
pub fn compute_integrity_hash(entry: &AuditEntry, previous_hash: &str) -> VaultResult<String> {
    let body = canonicalize(entry)?;

    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hasher.update(previous_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{Actor, AuditAction, AuditDraft, Resource};
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({"b": 1, "a": {"z": [true, null, "x"], "y": 2.5}});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a":{"y":2.5,"z":[true,null,"x"]},"b":1}"#
        );
    }

    #[test]
    fn test_canonical_json_order_independent() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":{"p":"q","o":"r"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":{"o":"r","p":"q"},"x":1}"#).unwrap();
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn test_genesis_hash_shape() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn test_hash_excludes_hash_field_and_depends_on_previous() {
        let mut entry = AuditEntry::from_draft(AuditDraft::new(
            AuditAction::Create,
            Actor::new("u1", "admin"),
            Resource::new("employee", "e1", "t1"),
        ));

        let before = compute_integrity_hash(&entry, GENESIS_HASH).unwrap();
        entry.set_integrity_hash(before.clone());
        let after = compute_integrity_hash(&entry, GENESIS_HASH).unwrap();
        assert_eq!(before, after);
        assert_eq!(before.len(), 64);
        assert!(!canonicalize(&entry).unwrap().contains("integrityHash"));

        let chained = compute_integrity_hash(&entry, &before).unwrap();
        assert_ne!(chained, before);

        entry.details = json!({"changed": true});
        assert_ne!(compute_integrity_hash(&entry, GENESIS_HASH).unwrap(), before);
    }
}
