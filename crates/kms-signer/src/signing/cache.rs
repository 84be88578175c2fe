use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::algorithm::{self, SigningAlgorithm};
use super::key::KeyReference;
use super::provider::{self, SignIntent, SignatureProvider};
use super::remote::RemoteSigningClient;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    key_id: String,
    algorithm: SigningAlgorithm,
    intent: SignIntent,
}

struct CacheEntry {
    provider: Arc<SignatureProvider>,
    refs: usize,
}

/// Reference-counted pool of providers, one per (key, algorithm, intent).
///
/// Providers are built under the map lock. Construction never talks to
/// the KMS, so the lock is never held across a network call.
pub struct ProviderCache {
    remote: Arc<dyn RemoteSigningClient>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ProviderCache {
    pub fn new(remote: Arc<dyn RemoteSigningClient>) -> Self {
        Self {
            remote,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the shared provider for the triple, building it on a miss.
    ///
    /// Every successful call must be paired with a [`release`](Self::release).
    pub fn get_or_create(
        &self,
        key: &KeyReference,
        algorithm_id: &str,
        intent: SignIntent,
    ) -> Result<Arc<SignatureProvider>> {
        let spec = algorithm::resolve(Some(algorithm_id))?;
        // A hit must reject what a fresh construction would reject.
        provider::validate(key, &spec, intent)?;
        let cache_key = CacheKey {
            key_id: key.key_id().to_string(),
            algorithm: spec.algorithm,
            intent,
        };

        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(&cache_key) {
            if entry.provider.is_disposed() {
                // Disposed behind the cache's back; earlier holders keep the
                // dead instance and their releases no longer match.
                warn!(key_id = key.key_id(), "replacing disposed cached provider");
                entry.provider = Arc::new(SignatureProvider::with_spec(
                    key.clone(),
                    spec,
                    intent,
                    Arc::clone(&self.remote),
                )?);
                entry.refs = 1;
                return Ok(Arc::clone(&entry.provider));
            }
            entry.refs += 1;
            debug!(
                key_id = key.key_id(),
                algorithm = %spec.algorithm,
                %intent,
                refs = entry.refs,
                "provider cache hit"
            );
            return Ok(Arc::clone(&entry.provider));
        }

        let provider = Arc::new(SignatureProvider::with_spec(
            key.clone(),
            spec,
            intent,
            Arc::clone(&self.remote),
        )?);
        debug!(
            key_id = key.key_id(),
            algorithm = %spec.algorithm,
            %intent,
            "provider cache miss"
        );
        entries.insert(
            cache_key,
            CacheEntry {
                provider: Arc::clone(&provider),
                refs: 1,
            },
        );
        Ok(provider)
    }

    /// Drops one reference. Returns true when this was the last one and
    /// the provider has been disposed and evicted.
    pub fn release(&self, provider: &Arc<SignatureProvider>) -> bool {
        let cache_key = CacheKey {
            key_id: provider.key().key_id().to_string(),
            algorithm: provider.spec().algorithm,
            intent: provider.intent(),
        };

        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&cache_key) else {
            warn!(key_id = provider.key().key_id(), "released provider is not cached");
            return false;
        };
        if !Arc::ptr_eq(&entry.provider, provider) {
            warn!(key_id = provider.key().key_id(), "released provider is not cached");
            return false;
        }

        entry.refs -= 1;
        if entry.refs > 0 {
            return false;
        }
        if let Some(entry) = entries.remove(&cache_key) {
            entry.provider.dispose();
        }
        true
    }

    /// Outstanding references for a triple; zero when it is not cached.
    pub fn ref_count(&self, key_id: &str, algorithm: SigningAlgorithm, intent: SignIntent) -> usize {
        let cache_key = CacheKey {
            key_id: key_id.to_string(),
            algorithm,
            intent,
        };
        self.lock().get(&cache_key).map_or(0, |entry| entry.refs)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The map stays consistent even if a holder panicked: every mutation
    // is a single insert, remove or counter update.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
