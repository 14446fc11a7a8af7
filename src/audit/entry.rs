//! Audit entry data structures
//!
//! Defines the actions, severities, actor and resource context of an audit
//! record, the caller-built [`AuditDraft`], and the appended [`AuditEntry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened
///
/// Serialized as a plain string. Unknown strings round-trip as
/// [`AuditAction::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditAction {
    Encrypt,
    EncryptError,
    Decrypt,
    DecryptError,
    DecryptAccessDenied,
    ValidationFailure,
    Create,
    Read,
    Update,
    Delete,
    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::Encrypt => "encrypt",
            AuditAction::EncryptError => "encrypt_error",
            AuditAction::Decrypt => "decrypt",
            AuditAction::DecryptError => "decrypt_error",
            AuditAction::DecryptAccessDenied => "decrypt_access_denied",
            AuditAction::ValidationFailure => "validation_failure",
            AuditAction::Create => "CREATE",
            AuditAction::Read => "READ",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Custom(name) => name,
        }
    }
}

impl From<String> for AuditAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "encrypt" => AuditAction::Encrypt,
            "encrypt_error" => AuditAction::EncryptError,
            "decrypt" => AuditAction::Decrypt,
            "decrypt_error" => AuditAction::DecryptError,
            "decrypt_access_denied" => AuditAction::DecryptAccessDenied,
            "validation_failure" => AuditAction::ValidationFailure,
            "CREATE" => AuditAction::Create,
            "READ" => AuditAction::Read,
            "UPDATE" => AuditAction::Update,
            "DELETE" => AuditAction::Delete,
            _ => AuditAction::Custom(value),
        }
    }
}

impl From<&str> for AuditAction {
    fn from(value: &str) -> Self {
        AuditAction::from(value.to_string())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        match action {
            AuditAction::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much attention an entry deserves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Who performed the action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

/// What the action touched; `tenant_id` selects the chain stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    pub tenant_id: String,
}

impl Resource {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// An entry that has not been appended yet
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    pub action: AuditAction,
    pub severity: Severity,
    pub actor: Actor,
    pub resource: Resource,
    pub details: serde_json::Value,
}

impl AuditDraft {
    pub fn new(action: impl Into<AuditAction>, actor: Actor, resource: Resource) -> Self {
        Self {
            action: action.into(),
            severity: Severity::Info,
            actor,
            resource,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// A single appended audit entry
///
/// `integrity_hash` covers every other field plus the previous entry's hash
/// in the same tenant stream. It is only ever computed, never set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub severity: Severity,
    pub actor: Actor,
    pub resource: Resource,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    integrity_hash: String,
}

impl AuditEntry {
    /// Stamp a draft with an id and the current time; the hash is filled in
    /// by the chain
    pub(crate) fn from_draft(draft: AuditDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: draft.action,
            severity: draft.severity,
            actor: draft.actor,
            resource: draft.resource,
            details: draft.details,
            timestamp: Utc::now(),
            integrity_hash: String::new(),
        }
    }

    pub(crate) fn set_integrity_hash(&mut self, hash: String) {
        self.integrity_hash = hash;
    }

    pub fn integrity_hash(&self) -> &str {
        &self.integrity_hash
    }

    pub fn tenant_id(&self) -> &str {
        &self.resource.tenant_id
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {} {}/{} by {} ({})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.severity.to_string().to_uppercase(),
            self.action,
            self.resource.tenant_id,
            self.resource.resource_type,
            self.resource.id,
            self.actor.user_id,
            self.actor.role
        );

        let has_details = match &self.details {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => true,
        };
        if has_details {
            output.push_str(&format!("\n  Details: {}", self.details));
        }

        output
    }
}
