use super::algorithm::SigningAlgorithm;
use crate::error::Result;

/// The in-process signing contract.
///
/// Callers see the same `sign`/`verify` surface whether the key is local
/// or held by a KMS.
pub trait PayloadSigner: Send + Sync {
    /// Sign raw payload bytes. Returns raw signature bytes.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// `Ok(false)` on a signature mismatch; errors are reserved for
    /// calls that could not be completed.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool>;

    fn algorithm(&self) -> SigningAlgorithm;
}
