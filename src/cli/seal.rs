//! Seal and open CLI commands
//!
//! Both commands record their outcome in the audit ledger. A failed seal or
//! open is recorded as its own entry before the error is returned.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use super::{key_store, read_input, write_output, AuditContextArgs, AuditLedger, PassphraseArgs};
use crate::audit::{AuditAction, AuditDraft, Severity};
use crate::config::{Settings, VaultPaths};
use crate::envelope::{Envelope, EnvelopeCodec, UnwrapCredential, WrapMode};
use crate::error::{VaultError, VaultResult};
use crate::kms::RemoteKeyWrapper;

/// Arguments for `vault seal`
#[derive(Args)]
pub struct SealArgs {
    /// Local key pair to wrap the data key under
    #[arg(long, conflicts_with = "remote", required_unless_present = "remote")]
    pub key: Option<String>,

    /// Wrap the data key through the configured key custodian
    #[arg(long)]
    pub remote: bool,

    /// Custodian key version (defaults to the configured version, else primary)
    #[arg(long, requires = "remote")]
    pub key_version: Option<String>,

    /// File to seal (stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Where to write the envelope JSON (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub audit: AuditContextArgs,
}

/// Arguments for `vault open`
#[derive(Args)]
pub struct OpenArgs {
    /// Local key pair holding the private key (remote custody when omitted)
    #[arg(long)]
    pub key: Option<String>,

    /// Envelope JSON to open (stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Where to write the plaintext (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub passphrase: PassphraseArgs,

    #[command(flatten)]
    pub audit: AuditContextArgs,
}

fn build_codec(settings: &Settings) -> VaultResult<EnvelopeCodec> {
    Ok(match RemoteKeyWrapper::from_settings(settings)? {
        Some(remote) => EnvelopeCodec::with_remote(remote),
        None => EnvelopeCodec::new(),
    })
}

fn resource_id(input: Option<&PathBuf>) -> String {
    input
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdin".to_string())
}

/// Seal a file or stdin into an envelope
pub async fn handle_seal(paths: &VaultPaths, settings: &Settings, args: SealArgs) -> VaultResult<()> {
    let ledger = AuditLedger::open(paths)?;
    let resource = args.audit.resource(&resource_id(args.input.as_ref()));

    let result = seal_payload(paths, settings, &args).await;

    let (action, severity, details) = match &result {
        Ok((bytes, key_identity)) => (
            AuditAction::Encrypt,
            Severity::Info,
            json!({ "bytes": bytes, "keyIdentity": key_identity }),
        ),
        Err(err) => {
            let action = match err {
                VaultError::Validation(_) => AuditAction::ValidationFailure,
                _ => AuditAction::EncryptError,
            };
            (action, Severity::Warning, json!({ "errorKind": err.kind().to_string() }))
        }
    };

    ledger.record(
        AuditDraft::new(action, args.audit.actor(), resource)
            .with_severity(severity)
            .with_details(details),
    )?;

    result.map(|_| ())
}

/// Seal and write the envelope; returns the payload size and key identity
async fn seal_payload(
    paths: &VaultPaths,
    settings: &Settings,
    args: &SealArgs,
) -> VaultResult<(usize, String)> {
    let codec = build_codec(settings)?;
    let plaintext = read_input(args.input.as_deref())?;

    let envelope = match &args.key {
        Some(name) => {
            let public_key = key_store(paths, settings).load_public(name)?;
            codec
                .seal_bytes(&plaintext, WrapMode::Local(&public_key))
                .await?
        }
        None => {
            let key_version = args
                .key_version
                .as_deref()
                .or(settings.kms.default_key_version.as_deref());
            codec
                .seal_bytes(&plaintext, WrapMode::Remote { key_version })
                .await?
        }
    };

    write_output(args.output.as_deref(), envelope.to_json()?.as_bytes())?;
    Ok((plaintext.len(), envelope.key_identity().to_string()))
}

/// Open an envelope from a file or stdin
pub async fn handle_open(paths: &VaultPaths, settings: &Settings, args: OpenArgs) -> VaultResult<()> {
    let ledger = AuditLedger::open(paths)?;
    let resource = args.audit.resource(&resource_id(args.input.as_ref()));

    let result = open_envelope(paths, settings, &args).await;

    let (action, severity, details) = match &result {
        Ok(plaintext) => (
            AuditAction::Decrypt,
            Severity::Info,
            json!({ "bytes": plaintext.len() }),
        ),
        Err(err) => {
            let (action, severity) = match err {
                VaultError::AccessDenied => (AuditAction::DecryptAccessDenied, Severity::Warning),
                VaultError::Validation(_) => (AuditAction::ValidationFailure, Severity::Warning),
                VaultError::Integrity(_) => (AuditAction::DecryptError, Severity::Critical),
                _ => (AuditAction::DecryptError, Severity::Warning),
            };
            (action, severity, json!({ "errorKind": err.kind().to_string() }))
        }
    };

    ledger.record(
        AuditDraft::new(action, args.audit.actor(), resource)
            .with_severity(severity)
            .with_details(details),
    )?;

    let plaintext = result?;
    write_output(args.output.as_deref(), &plaintext)
}

async fn open_envelope(paths: &VaultPaths, settings: &Settings, args: &OpenArgs) -> VaultResult<Vec<u8>> {
    let raw = read_input(args.input.as_deref())?;
    let text = std::str::from_utf8(&raw)
        .map_err(|_| VaultError::validation("Envelope is not valid UTF-8"))?;
    let envelope = Envelope::from_json(text.trim())?;
    let codec = build_codec(settings)?;

    match &args.key {
        Some(name) => {
            let passphrase = args.passphrase.resolve(false)?;
            let private_key = key_store(paths, settings).load_private(name, passphrase.expose())?;
            codec
                .open_bytes(&envelope, UnwrapCredential::Local(&private_key))
                .await
        }
        None => codec.open_bytes(&envelope, UnwrapCredential::Remote).await,
    }
}
