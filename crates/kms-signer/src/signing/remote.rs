use super::algorithm::SigningAlgorithm;
use super::key::KeyMetadata;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KmsError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("KMS unavailable: {0}")]
    Unavailable(String),
    #[error("KMS request timed out")]
    Timeout,
    #[error("KMS request was cancelled")]
    Cancelled,
    #[error("KMS rejected the request: {0}")]
    Rejected(String),
    #[error("malformed KMS response: {0}")]
    MalformedResponse(String),
}

/// Capability to use a private key that never leaves the KMS.
///
/// Only digests cross this boundary. Implementations are sync and may
/// block on network I/O; they must be safe to call from several threads
/// at once, since a single provider is shared by concurrent callers.
/// Timeouts and retries are the implementation's business.
pub trait RemoteSigningClient: Send + Sync {
    fn get_key_metadata(&self, key_id: &str) -> Result<KeyMetadata, KmsError>;

    /// Signs a precomputed digest. Returns raw signature bytes.
    fn sign_digest(
        &self,
        key_id: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>, KmsError>;

    /// Checks a signature over a precomputed digest.
    ///
    /// A signature that does not match is `Ok(false)`, not an error.
    fn verify_digest(
        &self,
        key_id: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, KmsError>;
}
