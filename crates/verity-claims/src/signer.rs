use chrono::{SubsecRound, Utc};

use verity_crypto::{sign, KeyPair};
use verity_identity::{canonicalize_versioned, CanonicalizationVersion, Claim, ClaimProof, DidDocument};

use crate::error::ClaimError;

/// Sign an unsigned claim with a verification method of its issuer.
///
/// The secret is only used to derive a key pair, which is wiped on drop.
/// Signing is one-way: an already signed claim is rejected.
pub fn sign_claim(
    claim: &Claim,
    issuer_document: &DidDocument,
    secret_key: &[u8],
    vm_id: &str,
) -> Result<Claim, ClaimError> {
    if claim.is_signed() {
        return Err(ClaimError::AlreadySigned(claim.id.to_string()));
    }
    if claim.issuer != *issuer_document.id() {
        return Err(ClaimError::Validation(format!(
            "claim issuer {} does not match document {}",
            claim.issuer,
            issuer_document.id()
        )));
    }
    if !claim.has_consistent_id() {
        return Err(ClaimError::Validation(format!(
            "claim id {} does not match the claim's fields",
            claim.id
        )));
    }

    let method = issuer_document.resolve(vm_id)?;
    let expected = method.public_key()?;
    let keypair = KeyPair::from_secret_bytes(method.method_type.key_type(), secret_key)?;
    if keypair.public_key() != expected {
        return Err(ClaimError::KeyMismatch(method.id.clone()));
    }

    let version = CanonicalizationVersion::CURRENT;
    let payload = canonicalize_versioned(claim, version)?;
    let signature = sign(payload.as_bytes(), &keypair)?;

    let signed = claim.clone().with_proof(ClaimProof {
        verification_method_id: method.id.clone(),
        signature: signature.to_hex(),
        signed_at: Utc::now().trunc_subsecs(6),
        canonicalization_version: version,
    });

    tracing::info!(
        claim_id = %signed.id,
        issuer = %signed.issuer,
        method = %method.id,
        "claim signed"
    );
    Ok(signed)
}
