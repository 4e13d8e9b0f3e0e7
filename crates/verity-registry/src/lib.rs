//! Verity Registry
//!
//! The registry is the durable store of record for DID documents and signed
//! claims. This crate defines the [`Registry`] capability and two
//! implementations: [`HttpRegistry`], a retrying client for the registry's
//! HTTP API, and [`InMemoryRegistry`], a process-local store with the same
//! semantics.

pub mod error;
pub mod http;
pub mod memory;
pub mod retry;

pub use error::RegistryError;
pub use http::HttpRegistry;
pub use memory::InMemoryRegistry;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use verity_core::{ClaimId, Did};
use verity_identity::{Claim, DidDocument};

/// What a publish did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Created,
    /// Identical payload was already stored.
    Unchanged,
    /// A DID document replaced an earlier revision.
    Updated,
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Registry acknowledgement of a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishAck {
    pub id: String,
    pub outcome: PublishOutcome,
}

/// Storage capability used by the signer and the verification pipeline.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Publish or update a DID document. The tier of a stored document cannot change.
    async fn publish_did(&self, doc: &DidDocument) -> Result<PublishAck, RegistryError>;

    async fn fetch_did(&self, did: &Did) -> Result<DidDocument, RegistryError>;

    /// Publish a claim. Claims are immutable once stored.
    async fn publish_claim(&self, claim: &Claim) -> Result<PublishAck, RegistryError>;

    async fn fetch_claim(&self, id: &ClaimId) -> Result<Claim, RegistryError>;
}
