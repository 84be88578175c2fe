#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use kms_signer::signing::{KeyMetadata, LocalKeyVault};
use kms_signer::{KmsError, RemoteSigningClient, SigningAlgorithm};

pub const TEST_KEY: &str = "https://vault.test/keys/signing/1";
pub const TEST_KEY_BITS: usize = 1024;

static VAULT: LazyLock<Arc<LocalKeyVault>> = LazyLock::new(|| {
    let vault = LocalKeyVault::new();
    vault
        .create_key_from_seed(TEST_KEY, "integration-test-seed", TEST_KEY_BITS)
        .unwrap();
    Arc::new(vault)
});

/// Wraps the shared test vault, counting every call and optionally
/// failing them.
#[derive(Default)]
pub struct RecordingClient {
    pub metadata_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    fail_with: Mutex<Option<KmsError>>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn total_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
            + self.sign_calls.load(Ordering::SeqCst)
            + self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_calls(&self, error: Option<KmsError>) {
        *self.fail_with.lock().unwrap() = error;
    }

    fn injected(&self) -> Result<(), KmsError> {
        match self.fail_with.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl RemoteSigningClient for RecordingClient {
    fn get_key_metadata(&self, key_id: &str) -> Result<KeyMetadata, KmsError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.injected()?;
        VAULT.get_key_metadata(key_id)
    }

    fn sign_digest(
        &self,
        key_id: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<u8>, KmsError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.injected()?;
        VAULT.sign_digest(key_id, algorithm, digest)
    }

    fn verify_digest(
        &self,
        key_id: &str,
        algorithm: SigningAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, KmsError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.injected()?;
        VAULT.verify_digest(key_id, algorithm, digest, signature)
    }
}

/// 16 bytes of seeded pseudo-random input.
pub fn random_input(seed: u64) -> Vec<u8> {
    use rand_chacha::ChaCha20Rng;
    use rand_chacha::rand_core::{RngCore, SeedableRng};

    let mut input = vec![0u8; 16];
    ChaCha20Rng::seed_from_u64(seed).fill_bytes(&mut input);
    input
}
