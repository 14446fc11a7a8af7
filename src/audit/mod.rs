//! Tamper-evident audit ledger
//!
//! # Architecture
//!
//! - `AuditDraft` / `AuditEntry`: what callers record and what the chain
//!   hands back, with actor, resource, severity and free-form details.
//! - `AuditChain`: per-tenant hash chains; assigns ids and timestamps,
//!   computes `integrityHash` and tracks each stream's tail.
//! - `verify_entry` / `verify_chain`: recompute hashes from the genesis
//!   constant and report the first broken position.
//! - `AuditLogger`: line-delimited JSON (JSONL) persistence; writers hold an
//!   exclusive file lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use vault::audit::{Actor, AuditAction, AuditChain, AuditDraft, AuditLogger, Resource};
//!
//! let logger = AuditLogger::new(paths.audit_log());
//! let chain = AuditChain::resume(&logger.read_all()?)?;
//!
//! let entry = chain.append(AuditDraft::new(
//!     AuditAction::Decrypt,
//!     Actor::new("user-7", "auditor"),
//!     Resource::new("document", "doc-42", "tenant-a"),
//! ))?;
//! logger.log(&entry)?;
//! ```

mod chain;
mod entry;
mod hash;
mod logger;

pub use chain::{verify_by_tenant, verify_chain, verify_entry, AuditChain, ChainVerification};
pub use entry::{Actor, AuditAction, AuditDraft, AuditEntry, Resource, Severity};
pub use hash::{canonical_json, canonicalize, compute_integrity_hash, GENESIS_HASH};
pub use logger::{AuditLogger, LockedLedger};
