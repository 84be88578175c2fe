use crate::signing::{KmsError, SignIntent};

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("Key {key_id} is {size_bits} bits, algorithm requires at least {minimum_bits} bits")]
    KeyTooWeak {
        key_id: String,
        size_bits: u32,
        minimum_bits: u32,
    },
    #[error("Operation not permitted on a {intent} provider: {operation}")]
    InvalidOperation {
        intent: SignIntent,
        operation: &'static str,
    },
    #[error("Remote operation on key {key_id} failed")]
    CryptographicOperationFailed {
        key_id: String,
        #[source]
        source: KmsError,
    },
    #[error("Remote operation on key {key_id} timed out")]
    Timeout { key_id: String },
    #[error("Signature provider for key {key_id} has been released")]
    Disposed { key_id: String },
}

impl SignatureError {
    /// Wraps a remote failure, keeping timeouts distinguishable.
    pub(crate) fn remote(key_id: &str, source: KmsError) -> Self {
        match source {
            KmsError::Timeout => Self::Timeout {
                key_id: key_id.to_string(),
            },
            source => Self::CryptographicOperationFailed {
                key_id: key_id.to_string(),
                source,
            },
        }
    }

    /// True when the error happened before anything was sent to the KMS.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::UnsupportedAlgorithm(_)
                | Self::KeyTooWeak { .. }
                | Self::InvalidOperation { .. }
                | Self::Disposed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SignatureError>;
