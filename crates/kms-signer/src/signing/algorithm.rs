use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::SignatureError;

/// Minimum RSA modulus accepted for signing.
pub const MINIMUM_RSA_KEY_BITS: u32 = 2048;

/// Hash applied locally before the digest is sent to the KMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// Signing algorithms a remote key can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SigningAlgorithm {
    RsaSha256,
    RsaSha384,
    RsaSha512,
}

impl SigningAlgorithm {
    pub const ALL: [SigningAlgorithm; 3] = [Self::RsaSha256, Self::RsaSha384, Self::RsaSha512];

    /// Canonical identifier, e.g. `RSA-SHA256`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaSha256 => "RSA-SHA256",
            Self::RsaSha384 => "RSA-SHA384",
            Self::RsaSha512 => "RSA-SHA512",
        }
    }

    /// JWA short name, e.g. `RS256`.
    pub fn jwa_name(&self) -> &'static str {
        match self {
            Self::RsaSha256 => "RS256",
            Self::RsaSha384 => "RS384",
            Self::RsaSha512 => "RS512",
        }
    }

    pub fn spec(&self) -> AlgorithmSpec {
        let digest = match self {
            Self::RsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 => DigestAlgorithm::Sha512,
        };
        AlgorithmSpec {
            algorithm: *self,
            digest,
            minimum_key_bits: MINIMUM_RSA_KEY_BITS,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SignatureError::InvalidArgument(
                "signing algorithm must not be empty".into(),
            ));
        }
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s || alg.jwa_name() == s)
            .ok_or_else(|| SignatureError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl From<SigningAlgorithm> for String {
    fn from(alg: SigningAlgorithm) -> Self {
        alg.as_str().to_string()
    }
}

impl TryFrom<String> for SigningAlgorithm {
    type Error = SignatureError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Everything a provider needs to know about one signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmSpec {
    pub algorithm: SigningAlgorithm,
    pub digest: DigestAlgorithm,
    pub minimum_key_bits: u32,
}

impl AlgorithmSpec {
    /// Raw signature length produced by a key of `key_bits`.
    ///
    /// PKCS#1 v1.5 signatures are exactly as long as the modulus, so the
    /// length depends on the key alone.
    pub fn signature_len(key_bits: u32) -> usize {
        key_bits.div_ceil(8) as usize
    }
}

/// Looks up the [`AlgorithmSpec`] for an algorithm identifier.
///
/// Fails with `InvalidArgument` for a missing or empty identifier and
/// `UnsupportedAlgorithm` for anything outside the supported set.
pub fn resolve(algorithm_id: Option<&str>) -> Result<AlgorithmSpec, SignatureError> {
    let id = algorithm_id.ok_or_else(|| {
        SignatureError::InvalidArgument("signing algorithm must be provided".into())
    })?;
    Ok(id.parse::<SigningAlgorithm>()?.spec())
}
