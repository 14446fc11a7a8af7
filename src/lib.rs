//! compliance-vault - data protection core for multi-tenant compliance records
//!
//! This library seals sensitive fields and documents with envelope encryption
//! and keeps a tamper-evident audit ledger of who touched what.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `crypto`: AES-256-GCM payload encryption, RSA-OAEP key wrapping,
//!   passphrase-protected key files
//! - `kms`: remote key custody (custodian trait, HTTP and in-memory
//!   custodians, retrying key wrapper)
//! - `envelope`: the self-describing `Envelope` and the codec that seals and
//!   opens it in local or remote custody
//! - `audit`: hash-chained audit entries, verification and JSONL persistence
//! - `config`: path resolution and settings
//! - `error`: error taxonomy with stable kinds
//!
//! # Example
//!
//! ```rust,ignore
//! use vault::crypto::{generate_key_pair, KeySize};
//! use vault::envelope::{EnvelopeCodec, UnwrapCredential, WrapMode};
//!
//! let pair = generate_key_pair(KeySize::Rsa2048)?;
//! let codec = EnvelopeCodec::new();
//!
//! let envelope = codec.seal_string("sensitive information", WrapMode::Local(&pair.public_key)).await?;
//! let plain = codec.open_string(&envelope, UnwrapCredential::Local(&pair.private_key)).await?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod envelope;
pub mod error;
pub mod kms;

pub use envelope::{Envelope, EnvelopeCodec, KeyIdentity, UnwrapCredential, WrapMode};
pub use error::{ErrorKind, VaultError, VaultResult};
