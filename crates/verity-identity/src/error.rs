use verity_core::CoreError;
use verity_crypto::CryptoError;

/// Identity-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("duplicate verification method: {0}")]
    DuplicateMethod(String),

    #[error("invalid verification method {id}: {reason}")]
    InvalidMethod { id: String, reason: String },

    #[error("verification method not found: {0}")]
    MethodNotFound(String),

    #[error("secret key does not match the public key registered under {0}")]
    KeyMismatch(String),

    #[error(
        "inline content is {size} bytes, above the {limit}-byte limit; use a file reference instead"
    )]
    ContentTooLarge { size: usize, limit: usize },

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("unsupported canonicalization version: {0}")]
    UnsupportedCanonicalization(u16),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
