//! Remote key custody
//!
//! Data keys can be wrapped by a key-management service that never releases
//! its private keys. The [`KeyCustodian`] trait is the boundary to that
//! service; [`RemoteKeyWrapper`] drives it with bounded retries and turns its
//! failures into stable, generic errors.
//!
//! - `custodian`: the trait and its error taxonomy
//! - `http`: custodian reached over HTTPS
//! - `memory`: in-process custodian with versioned keys
//! - `retry`: bounded exponential backoff for transient failures
//! - `wrapper`: the remote key wrapper used by the envelope codec

pub mod custodian;
pub mod http;
pub mod memory;
pub mod retry;
pub mod wrapper;

pub use custodian::{CustodianCiphertext, CustodianError, KeyCustodian};
pub use http::HttpCustodian;
pub use memory::InMemoryCustodian;
pub use retry::RetryPolicy;
pub use wrapper::{RemoteKeyWrapper, RemoteWrap};
