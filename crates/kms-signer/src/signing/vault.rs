use std::collections::HashMap;
use std::sync::RwLock;

use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{OsRng, SeedableRng};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::debug;

use super::algorithm::SigningAlgorithm;
use super::key::{KeyKind, KeyMetadata, KeyReference};
use super::remote::{KmsError, RemoteSigningClient};

/// In-memory stand-in for a KMS holding RSA keys.
///
/// Signs PKCS#1 v1.5 over digests it is handed, never over raw payloads,
/// so it exercises the provider exactly the way a remote vault would.
#[derive(Default)]
pub struct LocalKeyVault {
    keys: RwLock<HashMap<String, RsaPrivateKey>>,
}

impl LocalKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a key under `name` from a seed string.
    ///
    /// The SHA-256 hash of the seed seeds a deterministic CSPRNG, so the
    /// same seed always yields the same key.
    pub fn create_key_from_seed(
        &self,
        name: &str,
        seed: &str,
        bits: usize,
    ) -> Result<KeyReference, KmsError> {
        let hash = Sha256::digest(seed.as_bytes());
        let mut rng = ChaCha20Rng::from_seed(hash.into());
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| KmsError::Rejected(format!("generating RSA key: {e}")))?;
        self.insert(name, private_key)
    }

    pub fn create_key(&self, name: &str, bits: usize) -> Result<KeyReference, KmsError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| KmsError::Rejected(format!("generating RSA key: {e}")))?;
        self.insert(name, private_key)
    }

    pub fn delete_key(&self, name: &str) -> Result<bool, KmsError> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        Ok(keys.remove(name).is_some())
    }

    fn insert(&self, name: &str, private_key: RsaPrivateKey) -> Result<KeyReference, KmsError> {
        let size_bits = (private_key.size() * 8) as u32;
        self.keys
            .write()
            .map_err(|_| poisoned())?
            .insert(name.to_string(), private_key);
        debug!(key_id = name, size_bits, "stored key in local vault");
        Ok(KeyReference::new(name, KeyKind::Rsa).with_size_bits(size_bits))
    }

    fn with_key<T>(
        &self,
        key_id: &str,
        f: impl FnOnce(&RsaPrivateKey) -> Result<T, KmsError>,
    ) -> Result<T, KmsError> {
        let keys = self.keys.read().map_err(|_| poisoned())?;
        let key = keys
            .get(key_id)
            .ok_or_else(|| KmsError::KeyNotFound(key_id.to_string()))?;
        f(key)
    }
}

impl RemoteSigningClient for LocalKeyVault {
    fn get_key_metadata(&self, key_id: &str) -> Result<KeyMetadata, KmsError> {
        self.with_key(key_id, |key| {
            Ok(KeyMetadata {
                size_bits: (key.size() * 8) as u32,
                kind: KeyKind::Rsa,
            })
        })
    }

    fn sign_digest(
        &self,
        key_id: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>, KmsError> {
        check_digest_len(algorithm, digest)?;
        self.with_key(key_id, |key| {
            key.sign(pkcs1v15(algorithm), digest)
                .map_err(|e| KmsError::Rejected(format!("RSA signing failed: {e}")))
        })
    }

    fn verify_digest(
        &self,
        key_id: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, KmsError> {
        check_digest_len(algorithm, digest)?;
        self.with_key(key_id, |key| {
            Ok(key
                .to_public_key()
                .verify(pkcs1v15(algorithm), digest, signature)
                .is_ok())
        })
    }
}

fn pkcs1v15(algorithm: SigningAlgorithm) -> Pkcs1v15Sign {
    match algorithm {
        SigningAlgorithm::RsaSha256 => Pkcs1v15Sign::new::<Sha256>(),
        SigningAlgorithm::RsaSha384 => Pkcs1v15Sign::new::<Sha384>(),
        SigningAlgorithm::RsaSha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

fn check_digest_len(algorithm: SigningAlgorithm, digest: &[u8]) -> Result<(), KmsError> {
    let expected = algorithm.spec().digest.output_len();
    if digest.len() != expected {
        return Err(KmsError::Rejected(format!(
            "{algorithm} expects a {expected}-byte digest, got {}",
            digest.len()
        )));
    }
    Ok(())
}

fn poisoned() -> KmsError {
    KmsError::Unavailable("local key store lock poisoned".into())
}
