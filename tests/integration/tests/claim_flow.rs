//! Integration test: claim lifecycle from creation to verification.
//!
//! Drives `ClaimService` over an in-memory registry, covering the signing,
//! publication, tamper detection and verification scenarios end to end.

use std::io::Write;

use verity_claims::{
    verification_url, ErrorKind, Publication, Step, StepOutcome, VerifyOptions, VerifyTarget,
};
use verity_core::{ClaimType, Tier};
use verity_crypto::{sha256, KeyPair, KeyType};
use verity_identity::{
    canonicalize, Claim, ClaimContent, DidDocument, DidDocumentRequest, MethodSpec,
    PresentedContent,
};
use verity_integration_tests::{service_with_issuer, Issuer, ISSUER, MESSAGE, METHOD};

fn step_names(result: &verity_claims::VerificationResult) -> Vec<&'static str> {
    result.steps.iter().map(|(step, _)| step.name()).collect()
}

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_election_result_verifies_with_tier() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;

    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .expect("claim should build");
    let signed = service
        .sign_claim(&claim, &issuer.secret(), METHOD)
        .await
        .expect("signing should succeed");
    service
        .publish(Publication::Claim(&signed))
        .await
        .expect("publish should succeed");

    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;

    assert!(result.verified);
    assert_eq!(result.verification_tier, Some(Tier::A));
    assert_eq!(result.issuer.as_deref(), Some(ISSUER));
    assert_eq!(result.claim_id, signed.id.to_string());
    assert!(result.error_message.is_none());
    assert_eq!(
        step_names(&result),
        [
            "claim_fetch",
            "issuer_resolution",
            "method_resolution",
            "signature_check",
            "registration_check"
        ]
    );
    assert!(result
        .steps
        .iter()
        .all(|(_, outcome)| outcome == StepOutcome::Passed));
}

#[tokio::test]
async fn test_secp256k1_issuer_verifies() {
    let issuer = Issuer::new("did:verity:demo:election-commission", Tier::S, KeyType::Secp256k1, 9);
    let (service, _) = service_with_issuer(&issuer).await;

    let claim = service
        .create_claim(
            "did:verity:demo:election-commission",
            ClaimType::Message,
            ClaimContent::message(MESSAGE),
        )
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), "#key-1").await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let url = verification_url("http://127.0.0.1:8000", &signed.id);
    let result = service.verify(url, &VerifyOptions::default()).await;
    assert!(result.verified);
    assert_eq!(result.verification_tier, Some(Tier::S));
}

#[tokio::test]
async fn test_result_json_shape() {
    let issuer = Issuer::new(ISSUER, Tier::B, KeyType::Ed25519, 3);
    let (service, _) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["schema_version"], 2);
    assert_eq!(json["verification_method"], "did:example:org#key-1");
    assert_eq!(
        json["content_hash"],
        format!("sha256:{}", hex::encode(sha256(MESSAGE.as_bytes())))
    );
    assert!(json["issuer_name"].is_null());
    assert_eq!(json["verified"], true);
    assert_eq!(json["verification_tier"], "B");
    assert_eq!(json["steps"]["claim_fetch"], true);
    assert!(json["steps"].get("content_match").is_none());
    assert!(json["error_message"].is_null());

    let text = serde_json::to_string(&result).unwrap();
    let back: verity_claims::VerificationResult = serde_json::from_str(&text).unwrap();
    assert_eq!(back, result);
}

#[tokio::test]
async fn test_result_names_the_issuing_organization() {
    let keypair = KeyPair::from_secret_bytes(KeyType::Ed25519, &[13u8; 32]).unwrap();
    let document = DidDocument::create(DidDocumentRequest {
        organization_name: "Demo Election Commission".into(),
        namespace: "demo".into(),
        entity_identifier: None,
        jurisdiction: Some("DEMO".into()),
        tier: Tier::S,
        verification_methods: vec![MethodSpec::from_key(METHOD, &keypair.public_key())],
    })
    .unwrap();
    assert_eq!(document.id().uri(), "did:verity:demo:demo-election-commission");

    let issuer = Issuer { keypair, document };
    let (service, _) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(
            issuer.document.id().uri(),
            ClaimType::Message,
            ClaimContent::message(MESSAGE),
        )
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;
    assert!(result.verified);
    assert_eq!(result.issuer_name.as_deref(), Some("Demo Election Commission"));
    assert_eq!(
        result.verification_method.as_deref(),
        Some("did:verity:demo:demo-election-commission#key-1")
    );
}

// =========================================================================
// Content binding
// =========================================================================

#[tokio::test]
async fn test_tampered_presented_message_is_advisory() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let options = VerifyOptions::default()
        .with_content(PresentedContent::Message("tampered message".into()));
    let result = service.verify(signed.id.clone(), &options).await;

    assert!(result.verified);
    assert_eq!(result.step(Step::ContentMatch), Some(StepOutcome::Failed));
    assert!(result.passed(Step::SignatureCheck));
    assert!(result.detail(Step::ContentMatch).is_some());

    let strict = options.require_content_match(true);
    let result = service.verify(signed.id.clone(), &strict).await;
    assert!(!result.verified);
    assert!(result.verification_tier.is_none());
}

#[tokio::test]
async fn test_file_reference_claim_matches_file() {
    let issuer = Issuer::new(ISSUER, Tier::C, KeyType::Ed25519, 5);
    let (service, _) = service_with_issuer(&issuer).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"precinct 12: 4012 votes").unwrap();
    file.flush().unwrap();

    let content = ClaimContent::from_file(file.path(), Some("https://example.org/r.pdf".into()))
        .unwrap();
    let claim = service
        .create_claim(ISSUER, ClaimType::FileReference, content)
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let options =
        VerifyOptions::default().with_content(PresentedContent::File(file.path().to_path_buf()));
    let result = service.verify(signed.id.clone(), &options).await;
    assert!(result.verified);
    assert!(result.passed(Step::ContentMatch));

    let other = VerifyOptions::default()
        .with_content(PresentedContent::Bytes(b"precinct 12: 9999 votes".to_vec()));
    let result = service.verify(signed.id.clone(), &other).await;
    assert_eq!(result.step(Step::ContentMatch), Some(StepOutcome::Failed));
}

#[tokio::test]
async fn test_oversized_message_rejected() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;
    let err = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message("x".repeat(4097)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("file reference"));
}

// =========================================================================
// Tamper detection
// =========================================================================

#[tokio::test]
async fn test_registry_copy_tampered() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, registry) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let mut forged = signed.clone();
    forged.content = ClaimContent::message("Election result annulled");
    registry.overwrite_claim(&signed.id, forged);

    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;
    assert!(!result.verified);
    assert_eq!(result.step(Step::SignatureCheck), Some(StepOutcome::Failed));
    assert_eq!(result.step(Step::RegistrationCheck), Some(StepOutcome::Skipped));
}

#[tokio::test]
async fn test_local_copy_tampered() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let genuine = service
        .verify(VerifyTarget::from(signed.clone()), &VerifyOptions::default())
        .await;
    assert!(genuine.verified);

    let mut local = signed.clone();
    local.created_at += chrono::Duration::seconds(1);
    let result = service.verify(local, &VerifyOptions::default()).await;
    assert!(!result.verified);
    assert_eq!(result.step(Step::SignatureCheck), Some(StepOutcome::Failed));
}

#[tokio::test]
async fn test_removed_method_invalidates_claims() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let mut rotated = issuer.document.clone();
    rotated.remove_verification_method(METHOD).unwrap();
    service
        .publish(Publication::DidDocument(&rotated))
        .await
        .expect("documents can be updated");

    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;
    assert!(!result.verified);
    assert_eq!(result.step(Step::MethodResolution), Some(StepOutcome::Failed));
    assert_eq!(result.step(Step::SignatureCheck), Some(StepOutcome::Skipped));
}

// =========================================================================
// Registry semantics
// =========================================================================

#[tokio::test]
async fn test_publish_is_idempotent_and_conflicts_on_change() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, registry) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();

    service.publish(Publication::Claim(&signed)).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();
    assert_eq!(registry.claim_count(), 1);

    // Re-signing the same unsigned claim yields the same id with a new proof.
    let mut resigned = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    if let Some(proof) = resigned.proof.as_mut() {
        proof.signed_at += chrono::Duration::seconds(5);
    }
    assert_eq!(resigned.id, signed.id);
    let err = service
        .publish(Publication::Claim(&resigned))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_tier_cannot_change_on_republish() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;
    let promoted = Issuer::new(ISSUER, Tier::S, KeyType::Ed25519, 7);
    let err = service
        .publish(Publication::DidDocument(&promoted.document))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_key_mismatch() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let err = service
        .sign_claim(&claim, &[8u8; 32], METHOD)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyMismatch);
}

// =========================================================================
// Determinism
// =========================================================================

#[test]
fn test_canonical_bytes_survive_json_roundtrip() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let claim = Claim::build(
        issuer.document.id().clone(),
        ClaimType::Message,
        ClaimContent::message(MESSAGE),
    )
    .unwrap();

    let json = serde_json::to_string(&claim).unwrap();
    let back: Claim = serde_json::from_str(&json).unwrap();
    assert_eq!(back, claim);
    assert_eq!(canonicalize(&back).unwrap(), canonicalize(&claim).unwrap());
    assert!(back.has_consistent_id());
}

#[tokio::test]
async fn test_verification_is_repeatable() {
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 7);
    let (service, _) = service_with_issuer(&issuer).await;
    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    let signed = service.sign_claim(&claim, &issuer.secret(), METHOD).await.unwrap();
    service.publish(Publication::Claim(&signed)).await.unwrap();

    let targets = vec![
        VerifyTarget::from(signed.id.clone()),
        VerifyTarget::from(signed.id.to_string()),
        VerifyTarget::from(signed.clone()),
    ];
    let results = service.verify_many(targets, &VerifyOptions::default()).await;
    for result in &results {
        assert!(result.verified);
        assert_eq!(result.steps, results[0].steps);
    }
}
