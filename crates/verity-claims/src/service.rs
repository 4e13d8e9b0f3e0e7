//! `ClaimService`: the caller-facing surface over a registry.

use futures::future::join_all;
use std::sync::Arc;

use verity_core::{ClaimType, Did, VerityConfig};
use verity_identity::{Claim, ClaimContent, DidDocument};
use verity_registry::{HttpRegistry, PublishAck, Registry};

use crate::error::ClaimError;
use crate::result::VerificationResult;
use crate::signer;
use crate::verifier::{VerificationPipeline, VerifyOptions, VerifyTarget};

/// Something that can be published to the registry.
#[derive(Debug, Clone, Copy)]
pub enum Publication<'a> {
    Claim(&'a Claim),
    DidDocument(&'a DidDocument),
}

/// Creates, signs, publishes and verifies claims against one registry.
#[derive(Clone)]
pub struct ClaimService {
    registry: Arc<dyn Registry>,
    pipeline: VerificationPipeline,
}

impl ClaimService {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        let pipeline = VerificationPipeline::new(registry.clone());
        Self { registry, pipeline }
    }

    pub fn with_config(registry: Arc<dyn Registry>, config: &VerityConfig) -> Self {
        let pipeline = VerificationPipeline::with_config(registry.clone(), &config.verifier);
        Self { registry, pipeline }
    }

    /// Build a service talking to the HTTP registry named in the configuration.
    pub fn from_config(config: &VerityConfig) -> Result<Self, ClaimError> {
        config.validate()?;
        let registry = HttpRegistry::from_config(&config.registry)?;
        Ok(Self::with_config(Arc::new(registry), config))
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Verification options from the service configuration.
    pub fn default_options(&self) -> VerifyOptions {
        self.pipeline.default_options()
    }

    /// Build an unsigned claim. Nothing is stored.
    pub fn create_claim(
        &self,
        issuer: &str,
        claim_type: ClaimType,
        content: ClaimContent,
    ) -> Result<Claim, ClaimError> {
        let issuer = Did::new(issuer)?;
        Ok(Claim::build(issuer, claim_type, content)?)
    }

    /// Sign a claim with a method from the issuer's registered DID document.
    pub async fn sign_claim(
        &self,
        claim: &Claim,
        secret_key: &[u8],
        vm_id: &str,
    ) -> Result<Claim, ClaimError> {
        if claim.is_signed() {
            return Err(ClaimError::AlreadySigned(claim.id.to_string()));
        }
        let document = self.registry.fetch_did(&claim.issuer).await?;
        signer::sign_claim(claim, &document, secret_key, vm_id)
    }

    /// Publish a signed claim or a DID document.
    pub async fn publish(&self, publication: Publication<'_>) -> Result<PublishAck, ClaimError> {
        let ack = match publication {
            Publication::Claim(claim) => {
                if !claim.is_signed() {
                    return Err(ClaimError::Validation(format!(
                        "claim {} must be signed before publishing",
                        claim.id
                    )));
                }
                if !claim.has_consistent_id() {
                    return Err(ClaimError::Validation(format!(
                        "claim id {} does not match the claim's fields",
                        claim.id
                    )));
                }
                self.registry.publish_claim(claim).await?
            }
            Publication::DidDocument(document) => {
                if document.proof().is_some() {
                    document.verify_self_signature()?;
                }
                self.registry.publish_did(document).await?
            }
        };
        tracing::info!(id = %ack.id, outcome = %ack.outcome, "published");
        Ok(ack)
    }

    pub async fn verify(
        &self,
        target: impl Into<VerifyTarget>,
        options: &VerifyOptions,
    ) -> VerificationResult {
        self.pipeline.verify(target, options).await
    }

    /// Verify several targets concurrently. Results keep the input order.
    pub async fn verify_many(
        &self,
        targets: Vec<VerifyTarget>,
        options: &VerifyOptions,
    ) -> Vec<VerificationResult> {
        join_all(
            targets
                .into_iter()
                .map(|target| self.pipeline.verify(target, options)),
        )
        .await
    }
}
