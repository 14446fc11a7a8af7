//! Audit logger for the append-only ledger file
//!
//! Each entry is written as a single JSON line and flushed immediately.
//! Writers take an exclusive advisory lock on the file, so separate processes
//! appending to one ledger are serialized.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::PathBuf;

use fd_lock::RwLock;

use crate::error::{VaultError, VaultResult};

use super::entry::AuditEntry;

/// Handles writing audit entries to the ledger file
///
/// The file uses a line-delimited JSON format (JSONL) where each line is a
/// complete JSON object representing one appended entry, in append order.
pub struct AuditLogger {
    log_path: PathBuf,
}

/// The ledger file while this process holds its write lock
pub struct LockedLedger<'a> {
    file: &'a mut File,
}

impl LockedLedger<'_> {
    /// Everything persisted so far, including other writers' entries
    pub fn read_all(&mut self) -> VaultResult<Vec<AuditEntry>> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| VaultError::Io(format!("Failed to rewind audit log: {}", e)))?;
        parse_entries(BufReader::new(&mut *self.file))
    }

    /// Append entries and flush before the lock is released
    pub fn append(&mut self, entries: &[AuditEntry]) -> VaultResult<()> {
        for entry in entries {
            let mut line = serde_json::to_string(entry)
                .map_err(|e| VaultError::Json(format!("Failed to serialize audit entry: {}", e)))?;
            line.push('\n');

            self.file
                .write_all(line.as_bytes())
                .map_err(|e| VaultError::Io(format!("Failed to write audit entry: {}", e)))?;
        }

        self.file
            .flush()
            .map_err(|e| VaultError::Io(format!("Failed to flush audit log: {}", e)))
    }
}

fn parse_entries(reader: impl BufRead) -> VaultResult<Vec<AuditEntry>> {
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            VaultError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
            VaultError::Json(format!(
                "Failed to parse audit entry at line {}: {}",
                line_num + 1,
                e
            ))
        })?;

        entries.push(entry);
    }

    Ok(entries)
}

impl AuditLogger {
    /// Create a new AuditLogger that writes to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Run `f` while holding the exclusive lock on the ledger file
    ///
    /// Blocks until other writers release the file. The lock is dropped when
    /// `f` returns, whether or not it succeeded.
    pub fn with_exclusive<T, F>(&self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&mut LockedLedger<'_>) -> VaultResult<T>,
    {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut lock = RwLock::new(file);
        let mut guard = lock
            .write()
            .map_err(|e| VaultError::Io(format!("Failed to lock audit log: {}", e)))?;

        let mut ledger = LockedLedger { file: &mut *guard };
        f(&mut ledger)
    }

    /// Append one entry and flush
    pub fn log(&self, entry: &AuditEntry) -> VaultResult<()> {
        self.log_batch(std::slice::from_ref(entry))
    }

    /// Append several entries with a single flush
    pub fn log_batch(&self, entries: &[AuditEntry]) -> VaultResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.with_exclusive(|ledger| ledger.append(entries))
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> VaultResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;

        parse_entries(BufReader::new(file))
    }

    /// Read one tenant's stream, in append order
    pub fn read_stream(&self, tenant_id: &str) -> VaultResult<Vec<AuditEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|entry| entry.tenant_id() == tenant_id)
            .collect())
    }

    /// Read the most recent N entries from the log
    pub fn read_recent(&self, count: usize) -> VaultResult<Vec<AuditEntry>> {
        let mut all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries.split_off(start))
    }

    /// Number of non-empty lines in the log
    pub fn entry_count(&self) -> VaultResult<usize> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;

        let count = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count();

        Ok(count)
    }

    /// Check if the audit log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the audit log file
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}
