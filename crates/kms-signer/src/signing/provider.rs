use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::algorithm::{self, AlgorithmSpec, SigningAlgorithm};
use super::key::{KeyMetadata, KeyReference};
use super::remote::{KmsError, RemoteSigningClient};
use super::signer::PayloadSigner;
use crate::error::{Result, SignatureError};

/// Whether a provider will be used to create signatures or only to check them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignIntent {
    Sign,
    Verify,
}

impl fmt::Display for SignIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sign => "sign",
            Self::Verify => "verify",
        })
    }
}

/// Signs and verifies payloads with a key held by a remote KMS.
///
/// The digest is computed locally; only the digest is sent to the KMS.
/// A provider is safe to share between threads as long as its
/// [`RemoteSigningClient`] is.
pub struct SignatureProvider {
    key: KeyReference,
    spec: AlgorithmSpec,
    intent: SignIntent,
    remote: Arc<dyn RemoteSigningClient>,
    metadata: Mutex<Option<KeyMetadata>>,
    disposed: AtomicBool,
}

impl SignatureProvider {
    /// Builds a provider for `algorithm_id`.
    ///
    /// All validation is local; no KMS call is made here.
    pub fn create(
        key: KeyReference,
        algorithm_id: &str,
        intent: SignIntent,
        remote: Arc<dyn RemoteSigningClient>,
    ) -> Result<Self> {
        let spec = algorithm::resolve(Some(algorithm_id))?;
        Self::with_spec(key, spec, intent, remote)
    }

    pub fn with_spec(
        key: KeyReference,
        spec: AlgorithmSpec,
        intent: SignIntent,
        remote: Arc<dyn RemoteSigningClient>,
    ) -> Result<Self> {
        validate(&key, &spec, intent)?;

        debug!(
            key_id = key.key_id(),
            algorithm = %spec.algorithm,
            %intent,
            "created signature provider"
        );

        Ok(Self {
            key,
            spec,
            intent,
            remote,
            metadata: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn key(&self) -> &KeyReference {
        &self.key
    }

    pub fn spec(&self) -> &AlgorithmSpec {
        &self.spec
    }

    pub fn intent(&self) -> SignIntent {
        self.intent
    }

    pub fn will_create_signatures(&self) -> bool {
        self.intent == SignIntent::Sign
    }

    /// Hashes `payload` and has the KMS sign the digest.
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        self.ensure_live()?;
        if self.intent != SignIntent::Sign {
            return Err(SignatureError::InvalidOperation {
                intent: self.intent,
                operation: "sign",
            });
        }
        if payload.is_empty() {
            return Err(SignatureError::InvalidArgument(
                "payload must not be empty".into(),
            ));
        }

        let expected_len = AlgorithmSpec::signature_len(self.key_size_bits()?);
        let digest = self.spec.digest.hash(payload);

        debug!(
            key_id = self.key.key_id(),
            algorithm = %self.spec.algorithm,
            digest_len = digest.len(),
            "signing digest"
        );
        let signature = self
            .remote
            .sign_digest(self.key.key_id(), self.spec.algorithm, &digest)
            .map_err(|e| self.remote_failure("sign", e))?;

        if signature.len() != expected_len {
            return Err(self.remote_failure(
                "sign",
                KmsError::MalformedResponse(format!(
                    "expected {expected_len} signature bytes, got {}",
                    signature.len()
                )),
            ));
        }
        Ok(signature)
    }

    /// Hashes `payload` and has the KMS check `signature` against it.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool> {
        self.ensure_live()?;
        if payload.is_empty() {
            return Err(SignatureError::InvalidArgument(
                "payload must not be empty".into(),
            ));
        }
        if signature.is_empty() {
            return Err(SignatureError::InvalidArgument(
                "signature must not be empty".into(),
            ));
        }

        let digest = self.spec.digest.hash(payload);
        let valid = self
            .remote
            .verify_digest(self.key.key_id(), self.spec.algorithm, &digest, signature)
            .map_err(|e| self.remote_failure("verify", e))?;

        debug!(
            key_id = self.key.key_id(),
            algorithm = %self.spec.algorithm,
            valid,
            "verified digest"
        );
        Ok(valid)
    }

    /// Async form of [`sign`](Self::sign); the KMS call runs on the blocking pool.
    pub async fn sign_async(self: &Arc<Self>, payload: Vec<u8>) -> Result<Vec<u8>> {
        let provider = Arc::clone(self);
        tokio::task::spawn_blocking(move || provider.sign(&payload))
            .await
            .map_err(|_| SignatureError::remote(self.key.key_id(), KmsError::Cancelled))?
    }

    /// Async form of [`verify`](Self::verify).
    pub async fn verify_async(self: &Arc<Self>, payload: Vec<u8>, signature: Vec<u8>) -> Result<bool> {
        let provider = Arc::clone(self);
        tokio::task::spawn_blocking(move || provider.verify(&payload, &signature))
            .await
            .map_err(|_| SignatureError::remote(self.key.key_id(), KmsError::Cancelled))?
    }

    /// Marks the provider unusable. Returns false if it already was.
    pub fn dispose(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::AcqRel);
        if first {
            debug!(key_id = self.key.key_id(), "disposed signature provider");
        }
        first
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(SignatureError::Disposed {
                key_id: self.key.key_id().to_string(),
            });
        }
        Ok(())
    }

    fn key_size_bits(&self) -> Result<u32> {
        if let Some(size_bits) = self.key.size_bits() {
            return Ok(size_bits);
        }

        // Held only across the metadata fetch so concurrent first calls
        // share a single round-trip.
        let mut cached = self.metadata.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(metadata) = *cached {
            return Ok(metadata.size_bits);
        }

        debug!(key_id = self.key.key_id(), "fetching key metadata");
        let metadata = self
            .remote
            .get_key_metadata(self.key.key_id())
            .map_err(|e| self.remote_failure("get_key_metadata", e))?;
        *cached = Some(metadata);
        Ok(metadata.size_bits)
    }

    fn remote_failure(&self, operation: &str, source: KmsError) -> SignatureError {
        warn!(
            key_id = self.key.key_id(),
            algorithm = %self.spec.algorithm,
            operation,
            error = %source,
            "remote operation failed"
        );
        SignatureError::remote(self.key.key_id(), source)
    }
}

/// Local checks a key must pass before a provider may use it.
///
/// Runs on every provider request, including cache hits.
pub(crate) fn validate(key: &KeyReference, spec: &AlgorithmSpec, intent: SignIntent) -> Result<()> {
    if key.key_id().trim().is_empty() {
        return Err(SignatureError::InvalidArgument(
            "key identifier must not be empty".into(),
        ));
    }
    if !key.kind().is_rsa() {
        return Err(SignatureError::InvalidArgument(format!(
            "{} key {} cannot be used with {}",
            key.kind(),
            key.key_id(),
            spec.algorithm
        )));
    }
    if intent == SignIntent::Sign {
        if let Some(size_bits) = key.size_bits() {
            if size_bits < spec.minimum_key_bits {
                return Err(SignatureError::KeyTooWeak {
                    key_id: key.key_id().to_string(),
                    size_bits,
                    minimum_bits: spec.minimum_key_bits,
                });
            }
        }
    }
    Ok(())
}

impl PayloadSigner for SignatureProvider {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        SignatureProvider::sign(self, payload)
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool> {
        SignatureProvider::verify(self, payload, signature)
    }

    fn algorithm(&self) -> SigningAlgorithm {
        self.spec.algorithm
    }
}

impl fmt::Debug for SignatureProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureProvider")
            .field("key", &self.key)
            .field("algorithm", &self.spec.algorithm)
            .field("intent", &self.intent)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
