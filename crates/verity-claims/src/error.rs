use serde::Serialize;
use std::fmt;

use verity_core::CoreError;
use verity_crypto::CryptoError;
use verity_identity::IdentityError;
use verity_registry::RegistryError;

/// Caller-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input shape or size. Never retried.
    Validation,
    KeyMismatch,
    AlreadySigned,
    NotFound,
    Conflict,
    /// Transient registry failures exhausted the retry budget.
    RegistryUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::KeyMismatch => "key_mismatch",
            Self::AlreadySigned => "already_signed",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RegistryUnavailable => "registry_unavailable",
        };
        f.write_str(s)
    }
}

/// Errors from claim construction, signing and publication.
///
/// A claim that fails verification is not an error; see
/// [`VerificationResult`](crate::VerificationResult).
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("claim {0} is already signed")]
    AlreadySigned(String),

    #[error("secret key does not match the public key registered under {0}")]
    KeyMismatch(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl ClaimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadySigned(_) => ErrorKind::AlreadySigned,
            Self::KeyMismatch(_) | Self::Identity(IdentityError::KeyMismatch(_)) => {
                ErrorKind::KeyMismatch
            }
            Self::Registry(RegistryError::NotFound(_)) => ErrorKind::NotFound,
            Self::Registry(RegistryError::Conflict(_)) => ErrorKind::Conflict,
            Self::Registry(RegistryError::Unavailable { .. }) => ErrorKind::RegistryUnavailable,
            Self::Validation(_)
            | Self::Core(_)
            | Self::Identity(_)
            | Self::Crypto(_)
            | Self::Registry(RegistryError::Rejected { .. })
            | Self::Registry(RegistryError::Config(_)) => ErrorKind::Validation,
        }
    }
}
