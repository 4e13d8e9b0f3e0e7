use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use verity_core::{ClaimId, ClaimType, Did};
use verity_crypto::DigestAlgorithm;

use crate::canonical::{self, CanonicalizationVersion};
use crate::error::IdentityError;

/// Size ceiling for inline messages, in UTF-8 bytes.
pub const MAX_INLINE_BYTES: usize = 4096;

/// What a claim is about: a short inline message, or a digest reference to
/// content stored elsewhere. Large payloads are never embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ClaimContent {
    Inline {
        message: String,
    },
    External {
        /// Lowercase hex digest of the referenced bytes.
        hash: String,
        algorithm: DigestAlgorithm,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_bytes: Option<u64>,
        /// Original file name, without directories.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        /// Media type such as `application/pdf`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

impl ClaimContent {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Inline {
            message: message.into(),
        }
    }

    /// Reference content by a digest that was computed elsewhere.
    pub fn reference(hash: impl Into<String>, algorithm: DigestAlgorithm, uri: Option<String>) -> Self {
        Self::External {
            hash: hash.into(),
            algorithm,
            uri,
            size_bytes: None,
            filename: None,
            media_type: None,
        }
    }

    /// Reference in-memory bytes by their digest.
    pub fn from_bytes(bytes: &[u8], algorithm: DigestAlgorithm, uri: Option<String>) -> Self {
        Self::External {
            hash: hex::encode(verity_crypto::digest(algorithm, bytes)),
            algorithm,
            uri,
            size_bytes: Some(bytes.len() as u64),
            filename: None,
            media_type: None,
        }
    }

    /// Reference a local file by its SHA-256 digest. The file is streamed,
    /// never loaded whole. The file name is kept as metadata.
    pub fn from_file(path: &Path, uri: Option<String>) -> Result<Self, IdentityError> {
        let (hash, size) = verity_crypto::digest_file(DigestAlgorithm::Sha256, path)?;
        Ok(Self::External {
            hash: hex::encode(hash),
            algorithm: DigestAlgorithm::Sha256,
            uri,
            size_bytes: Some(size),
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            media_type: None,
        })
    }

    /// Attach a media type to external content. Inline content is returned
    /// unchanged.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        if let Self::External { media_type: slot, .. } = &mut self {
            *slot = Some(media_type.into());
        }
        self
    }

    /// `<algorithm>:<hex>` digest of the content. Inline messages are
    /// hashed with SHA-256.
    pub fn content_hash(&self) -> String {
        match self {
            Self::Inline { message } => format!(
                "{}:{}",
                DigestAlgorithm::Sha256,
                hex::encode(verity_crypto::sha256(message.as_bytes()))
            ),
            Self::External {
                hash, algorithm, ..
            } => format!("{}:{}", algorithm, hash),
        }
    }

    /// Claim type this content implies.
    pub fn claim_type(&self) -> ClaimType {
        match self {
            Self::Inline { .. } => ClaimType::Message,
            Self::External { .. } => ClaimType::FileReference,
        }
    }

    /// Check shape and size limits.
    pub fn validate(&self) -> Result<(), IdentityError> {
        match self {
            Self::Inline { message } => {
                if message.trim().is_empty() {
                    return Err(IdentityError::InvalidContent("message is empty".into()));
                }
                if message.len() > MAX_INLINE_BYTES {
                    return Err(IdentityError::ContentTooLarge {
                        size: message.len(),
                        limit: MAX_INLINE_BYTES,
                    });
                }
            }
            Self::External {
                hash,
                uri,
                filename,
                media_type,
                ..
            } => {
                let valid = hash.len() == 64
                    && hash
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
                if !valid {
                    return Err(IdentityError::InvalidContent(format!(
                        "content hash must be 64 lowercase hex characters, got {:?}",
                        hash
                    )));
                }
                if uri.as_deref().is_some_and(|u| u.trim().is_empty()) {
                    return Err(IdentityError::InvalidContent("content uri is empty".into()));
                }
                if filename
                    .as_deref()
                    .is_some_and(|f| f.trim().is_empty() || f.contains(['/', '\\']))
                {
                    return Err(IdentityError::InvalidContent(format!(
                        "filename must be a bare, non-empty name, got {:?}",
                        filename
                    )));
                }
                if let Some(media_type) = media_type {
                    let valid = media_type
                        .split_once('/')
                        .is_some_and(|(kind, sub)| !kind.is_empty() && !sub.is_empty())
                        && !media_type.chars().any(char::is_whitespace);
                    if !valid {
                        return Err(IdentityError::InvalidContent(format!(
                            "media type must look like type/subtype, got {:?}",
                            media_type
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether presented content is the content this claim refers to.
    pub fn matches(&self, presented: &PresentedContent) -> Result<bool, IdentityError> {
        match self {
            Self::Inline { message } => match presented {
                PresentedContent::Message(m) => Ok(m == message),
                PresentedContent::Bytes(b) => Ok(b.as_slice() == message.as_bytes()),
                PresentedContent::File(path) => {
                    let len = std::fs::metadata(path)
                        .map_err(verity_crypto::CryptoError::from)?
                        .len();
                    if len != message.len() as u64 {
                        return Ok(false);
                    }
                    let bytes = std::fs::read(path).map_err(verity_crypto::CryptoError::from)?;
                    Ok(bytes == message.as_bytes())
                }
            },
            Self::External {
                hash,
                algorithm,
                size_bytes,
                ..
            } => {
                let (digest, len) = match presented {
                    PresentedContent::Message(m) => {
                        (verity_crypto::digest(*algorithm, m.as_bytes()), m.len() as u64)
                    }
                    PresentedContent::Bytes(b) => {
                        (verity_crypto::digest(*algorithm, b), b.len() as u64)
                    }
                    PresentedContent::File(path) => verity_crypto::digest_file(*algorithm, path)?,
                };
                if size_bytes.is_some_and(|expected| expected != len) {
                    return Ok(false);
                }
                Ok(hex::encode(digest) == *hash)
            }
        }
    }
}

/// Content a verifier re-supplies to check against a stored claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedContent {
    Message(String),
    Bytes(Vec<u8>),
    /// Local file, hashed by streaming.
    File(PathBuf),
}

/// Signature attached to a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimProof {
    /// Full id (`did#fragment`) of the signing verification method.
    pub verification_method_id: String,
    /// Hex-encoded 64-byte signature.
    pub signature: String,
    pub signed_at: DateTime<Utc>,
    pub canonicalization_version: CanonicalizationVersion,
}

/// A statement bound to content and an issuer DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claim {
    /// Content-derived identifier, fixed at build time.
    pub id: ClaimId,
    pub issuer: Did,
    pub claim_type: ClaimType,
    pub content: ClaimContent,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ClaimProof>,
}

impl Claim {
    /// Build an unsigned claim timestamped now.
    pub fn build(
        issuer: Did,
        claim_type: ClaimType,
        content: ClaimContent,
    ) -> Result<Self, IdentityError> {
        Self::build_at(issuer, claim_type, content, crate::now())
    }

    /// Build an unsigned claim with an explicit creation time (truncated to
    /// microseconds).
    pub fn build_at(
        issuer: Did,
        claim_type: ClaimType,
        content: ClaimContent,
        created_at: DateTime<Utc>,
    ) -> Result<Self, IdentityError> {
        content.validate()?;
        if content.claim_type() != claim_type {
            return Err(IdentityError::InvalidContent(format!(
                "claim type {} does not match {} content",
                claim_type,
                content.claim_type()
            )));
        }
        let created_at = created_at.trunc_subsecs(6);
        let id = canonical::claim_id(&issuer, claim_type, &content, &created_at)?;

        tracing::debug!(claim_id = %id, issuer = %issuer, claim_type = %claim_type, "claim built");

        Ok(Self {
            id,
            issuer,
            claim_type,
            content,
            created_at,
            proof: None,
        })
    }

    pub fn is_signed(&self) -> bool {
        self.proof.is_some()
    }

    /// Recompute the id from the claim's own fields.
    pub fn compute_id(&self) -> Result<ClaimId, IdentityError> {
        canonical::claim_id(&self.issuer, self.claim_type, &self.content, &self.created_at)
    }

    /// Whether the stored id still matches the fields it was derived from.
    pub fn has_consistent_id(&self) -> bool {
        self.compute_id().is_ok_and(|id| id == self.id)
    }

    /// Return a signed copy. The id is unchanged.
    pub fn with_proof(mut self, proof: ClaimProof) -> Self {
        self.proof = Some(proof);
        self
    }
}
