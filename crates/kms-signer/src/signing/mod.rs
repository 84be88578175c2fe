mod algorithm;
mod cache;
mod key;
mod provider;
mod remote;
mod signer;
mod vault;

pub use algorithm::{
    AlgorithmSpec, DigestAlgorithm, MINIMUM_RSA_KEY_BITS, SigningAlgorithm, resolve,
};
pub use cache::ProviderCache;
pub use key::{KeyKind, KeyMetadata, KeyReference};
pub use provider::{SignIntent, SignatureProvider};
pub use remote::{KmsError, RemoteSigningClient};
pub use signer::PayloadSigner;
pub use vault::LocalKeyVault;
