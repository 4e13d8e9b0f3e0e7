use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use verity_core::{ClaimId, Did};
use verity_identity::{Claim, DidDocument};

use crate::error::RegistryError;
use crate::{PublishAck, PublishOutcome, Registry};

/// Process-local registry with the same contract as the HTTP service:
/// identical re-publishes are no-ops, claims never change once stored, and
/// DID documents may be revised but never change tier.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    dids: DashMap<String, DidDocument>,
    claims: DashMap<String, Claim>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn did_count(&self) -> usize {
        self.dids.len()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// Replace whatever is stored under `id`, bypassing immutability.
    /// Simulates a compromised or corrupted store in tests.
    pub fn overwrite_claim(&self, id: &ClaimId, claim: Claim) {
        tracing::warn!(claim_id = %id, "claim overwritten in memory registry");
        self.claims.insert(id.to_string(), claim);
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn publish_did(&self, doc: &DidDocument) -> Result<PublishAck, RegistryError> {
        let id = doc.id().to_string();
        let outcome = match self.dids.entry(id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(doc.clone());
                PublishOutcome::Created
            }
            Entry::Occupied(mut slot) => {
                if slot.get().tier() != doc.tier() {
                    return Err(RegistryError::Conflict(format!(
                        "{} (tier {} cannot change to {})",
                        id,
                        slot.get().tier(),
                        doc.tier()
                    )));
                }
                if slot.get() == doc {
                    PublishOutcome::Unchanged
                } else {
                    slot.insert(doc.clone());
                    PublishOutcome::Updated
                }
            }
        };
        tracing::debug!(did = %id, outcome = %outcome, "DID document stored");
        Ok(PublishAck { id, outcome })
    }

    async fn fetch_did(&self, did: &Did) -> Result<DidDocument, RegistryError> {
        self.dids
            .get(did.uri())
            .map(|doc| doc.value().clone())
            .ok_or_else(|| RegistryError::NotFound(did.to_string()))
    }

    async fn publish_claim(&self, claim: &Claim) -> Result<PublishAck, RegistryError> {
        let id = claim.id.to_string();
        let outcome = match self.claims.entry(id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(claim.clone());
                PublishOutcome::Created
            }
            Entry::Occupied(slot) => {
                if slot.get() != claim {
                    return Err(RegistryError::Conflict(id));
                }
                PublishOutcome::Unchanged
            }
        };
        tracing::debug!(claim_id = %id, outcome = %outcome, "claim stored");
        Ok(PublishAck { id, outcome })
    }

    async fn fetch_claim(&self, id: &ClaimId) -> Result<Claim, RegistryError> {
        self.claims
            .get(id.as_str())
            .map(|claim| claim.value().clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }
}
