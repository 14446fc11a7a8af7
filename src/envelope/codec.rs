//! Envelope sealing and opening
//!
//! Sealing draws a fresh data key, encrypts the payload with AES-256-GCM and
//! wraps the data key either under a local RSA public key or through the
//! remote custodian. Opening validates structure first, unwraps with the key
//! the envelope names, then decrypts.

use super::{Envelope, KeyIdentity};
use crate::crypto::local_wrapper::{self, PrivateKey, PublicKey};
use crate::crypto::symmetric::{self, SymmetricKey};
use crate::error::{VaultError, VaultResult};
use crate::kms::RemoteKeyWrapper;

/// How to wrap the data key of a new envelope
#[derive(Debug, Clone, Copy)]
pub enum WrapMode<'a> {
    /// Wrap under a local RSA public key
    Local(&'a PublicKey),

    /// Wrap through the custodian; `None` uses its primary version
    Remote { key_version: Option<&'a str> },
}

/// What the caller offers to unwrap an envelope's data key
#[derive(Debug, Clone, Copy)]
pub enum UnwrapCredential<'a> {
    Local(&'a PrivateKey),
    Remote,
}

/// Seals and opens envelopes in local or remote key custody
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec {
    remote: Option<RemoteKeyWrapper>,
}

impl EnvelopeCodec {
    /// A codec that only supports local key pairs
    pub fn new() -> Self {
        Self { remote: None }
    }

    /// A codec that can also wrap through `remote`
    pub fn with_remote(remote: RemoteKeyWrapper) -> Self {
        Self {
            remote: Some(remote),
        }
    }

    pub fn remote(&self) -> Option<&RemoteKeyWrapper> {
        self.remote.as_ref()
    }

    fn require_remote(&self) -> VaultResult<&RemoteKeyWrapper> {
        self.remote
            .as_ref()
            .ok_or_else(|| VaultError::Config("remote key custody is not configured".to_string()))
    }

    /// Seal a UTF-8 string
    pub async fn seal_string(&self, plaintext: &str, mode: WrapMode<'_>) -> VaultResult<Envelope> {
        self.seal_bytes(plaintext.as_bytes(), mode).await
    }

    /// Seal raw bytes
    pub async fn seal_bytes(&self, plaintext: &[u8], mode: WrapMode<'_>) -> VaultResult<Envelope> {
        let key = SymmetricKey::generate();
        let sealed = symmetric::encrypt(plaintext, &key)?;

        let (wrapped_key, key_identity) = match mode {
            WrapMode::Local(public_key) => {
                (local_wrapper::wrap(&key, public_key)?, KeyIdentity::Local)
            }
            WrapMode::Remote { key_version } => {
                let remote = self.require_remote()?;
                let wrap = remote.wrap(&key, key_version).await?;
                (
                    wrap.wrapped_key,
                    KeyIdentity::Remote {
                        key_path: wrap.key_path,
                        key_version: wrap.key_version,
                    },
                )
            }
        };

        tracing::debug!(
            bytes = plaintext.len(),
            key_identity = %key_identity,
            "payload sealed"
        );

        Ok(Envelope::seal(
            &sealed.ciphertext,
            &wrapped_key,
            &sealed.iv,
            &sealed.auth_tag,
            key_identity,
        ))
    }

    /// Open an envelope holding a UTF-8 string
    pub async fn open_string(
        &self,
        envelope: &Envelope,
        credential: UnwrapCredential<'_>,
    ) -> VaultResult<String> {
        let bytes = self.open_bytes(envelope, credential).await?;
        String::from_utf8(bytes)
            .map_err(|_| VaultError::validation("decrypted payload is not valid UTF-8"))
    }

    /// Open an envelope, returning the exact bytes that were sealed
    pub async fn open_bytes(
        &self,
        envelope: &Envelope,
        credential: UnwrapCredential<'_>,
    ) -> VaultResult<Vec<u8>> {
        let decoded = envelope.decode()?;

        let key = match (envelope.key_identity(), credential) {
            (KeyIdentity::Local, UnwrapCredential::Local(private_key)) => {
                local_wrapper::unwrap(&decoded.wrapped_key, private_key)?
            }
            (
                KeyIdentity::Remote {
                    key_path,
                    key_version,
                },
                UnwrapCredential::Remote,
            ) => {
                self.require_remote()?
                    .unwrap(&decoded.wrapped_key, key_path, key_version)
                    .await?
            }
            (KeyIdentity::Local, UnwrapCredential::Remote) => {
                return Err(VaultError::validation(
                    "envelope is locally wrapped; a private key is required",
                ));
            }
            (KeyIdentity::Remote { .. }, UnwrapCredential::Local(_)) => {
                return Err(VaultError::validation(
                    "envelope is wrapped by the key custodian; a local key cannot open it",
                ));
            }
        };

        let plaintext = symmetric::decrypt(&decoded.ciphertext, &key, &decoded.iv, &decoded.auth_tag)?;
        tracing::debug!(
            bytes = plaintext.len(),
            key_identity = %envelope.key_identity(),
            "payload opened"
        );
        Ok(plaintext)
    }
}
