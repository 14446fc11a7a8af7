//! Cryptographic primitives for the data-protection core
//!
//! Provides AES-256-GCM payload encryption with one-time keys, RSA-OAEP key
//! wrapping for locally-held key pairs, and passphrase-protected key files.

pub mod key_derivation;
pub mod key_store;
pub mod local_wrapper;
pub mod passphrase;
pub mod symmetric;

pub use key_derivation::{derive_key, KeyDerivationParams};
pub use key_store::KeyStore;
pub use local_wrapper::{generate_key_pair, KeyPair, KeySize, PrivateKey, PublicKey};
pub use passphrase::Passphrase;
pub use symmetric::{SealedPayload, SymmetricKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
