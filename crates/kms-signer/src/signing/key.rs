use std::fmt;

use serde::{Deserialize, Serialize};

use super::remote::{KmsError, RemoteSigningClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "RSA-HSM")]
    RsaHsm,
    #[serde(rename = "EC")]
    Ec,
}

impl KeyKind {
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::Rsa | Self::RsaHsm)
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rsa => "RSA",
            Self::RsaHsm => "RSA-HSM",
            Self::Ec => "EC",
        })
    }
}

/// Public facts about a remote key, as reported by the KMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub size_bits: u32,
    pub kind: KeyKind,
}

/// Handle to an asymmetric key held by a KMS.
///
/// The size is optional: a reference built from a bare locator leaves it
/// unknown and the provider asks the KMS the first time it needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyReference {
    key_id: String,
    kind: KeyKind,
    size_bits: Option<u32>,
}

impl KeyReference {
    pub fn new(key_id: impl Into<String>, kind: KeyKind) -> Self {
        Self {
            key_id: key_id.into(),
            kind,
            size_bits: None,
        }
    }

    pub fn with_size_bits(mut self, size_bits: u32) -> Self {
        self.size_bits = Some(size_bits);
        self
    }

    /// Builds a fully populated reference from the KMS's own metadata.
    pub fn resolve(
        client: &dyn RemoteSigningClient,
        key_id: impl Into<String>,
    ) -> Result<Self, KmsError> {
        let key_id = key_id.into();
        let metadata = client.get_key_metadata(&key_id)?;
        Ok(Self::new(key_id, metadata.kind).with_size_bits(metadata.size_bits))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn size_bits(&self) -> Option<u32> {
        self.size_bits
    }
}
