//! Sign and verify payloads with RSA keys that stay inside a remote KMS.
//!
//! A [`SignatureProvider`] hashes the payload locally and hands only the
//! digest to a [`RemoteSigningClient`]. Providers are usually obtained
//! from a [`ProviderCache`] so that concurrent callers share one instance
//! per key, algorithm and intent.

pub mod error;
pub mod signing;

pub use error::{Result, SignatureError};
pub use signing::{
    KeyKind, KeyReference, KmsError, LocalKeyVault, PayloadSigner, ProviderCache,
    RemoteSigningClient, SignIntent, SignatureProvider, SigningAlgorithm,
};
