//! Integration test: the claim service against an HTTP registry.
//!
//! A wiremock server plays the registry; the service is built from
//! configuration exactly as an embedder would build it.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use verity_claims::{ClaimService, ErrorKind, Publication, Step, StepOutcome, VerifyOptions};
use verity_core::{ClaimType, Tier, VerityConfig};
use verity_crypto::KeyType;
use verity_identity::{Claim, ClaimContent};
use verity_integration_tests::{init_tracing, Issuer, ISSUER, MESSAGE, METHOD};

fn config_for(server: &MockServer) -> VerityConfig {
    let mut config = VerityConfig::default();
    config.registry.base_url = server.uri();
    config.registry.timeout_ms = 2_000;
    config.registry.base_delay_ms = 1;
    config.registry.max_delay_ms = 5;
    config
}

fn signed_claim(issuer: &Issuer) -> Claim {
    let claim = Claim::build(
        issuer.document.id().clone(),
        ClaimType::Message,
        ClaimContent::message(MESSAGE),
    )
    .unwrap();
    verity_claims::sign_claim(&claim, &issuer.document, &issuer.secret(), METHOD).unwrap()
}

async fn mount_did(server: &MockServer, issuer: &Issuer) {
    Mock::given(method("GET"))
        .and(path(format!("/diddoc/{}", ISSUER)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&issuer.document))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_publish_and_sign_over_http() {
    init_tracing();
    let server = MockServer::start().await;
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 11);
    mount_did(&server, &issuer).await;
    Mock::given(method("POST"))
        .and(path("/diddoc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": ISSUER, "outcome": "created"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = ClaimService::from_config(&config_for(&server)).unwrap();
    service
        .publish(Publication::DidDocument(&issuer.document))
        .await
        .unwrap();

    let claim = service
        .create_claim(ISSUER, ClaimType::Message, ClaimContent::message(MESSAGE))
        .unwrap();
    Mock::given(method("POST"))
        .and(path("/claim"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": claim.id.as_str(), "outcome": "created"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let signed = service
        .sign_claim(&claim, &issuer.secret(), METHOD)
        .await
        .unwrap();
    let ack = service.publish(Publication::Claim(&signed)).await.unwrap();
    assert_eq!(ack.id, signed.id.as_str());
}

#[tokio::test]
async fn test_verify_survives_two_transient_failures() {
    init_tracing();
    let server = MockServer::start().await;
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 11);
    let signed = signed_claim(&issuer);
    let claim_path = format!("/claim/{}", signed.id);

    mount_did(&server, &issuer).await;
    Mock::given(method("GET"))
        .and(path(claim_path.as_str()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(claim_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&signed))
        .expect(1)
        .mount(&server)
        .await;

    let service = ClaimService::from_config(&config_for(&server)).unwrap();
    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;

    assert!(result.verified);
    assert_eq!(result.verification_tier, Some(Tier::A));
    let claim_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == claim_path)
        .count();
    assert_eq!(claim_requests, 3);
}

#[tokio::test]
async fn test_registry_down_is_reported_not_raised() {
    init_tracing();
    let server = MockServer::start().await;
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 11);
    let signed = signed_claim(&issuer);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let service = ClaimService::from_config(&config_for(&server)).unwrap();
    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;

    assert!(!result.verified);
    assert_eq!(result.step(Step::ClaimFetch), Some(StepOutcome::Failed));
    assert_eq!(result.step(Step::IssuerResolution), Some(StepOutcome::Skipped));
    let message = result.error_message.expect("unavailability is reported");
    assert!(message.contains("3 attempt"));
}

#[tokio::test]
async fn test_missing_claim_is_not_an_error_message() {
    init_tracing();
    let server = MockServer::start().await;
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 11);
    let signed = signed_claim(&issuer);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let service = ClaimService::from_config(&config_for(&server)).unwrap();
    let result = service.verify(signed.id.clone(), &VerifyOptions::default()).await;
    assert!(!result.verified);
    assert_eq!(result.step(Step::ClaimFetch), Some(StepOutcome::Failed));
    assert!(result.error_message.is_none());
}

#[tokio::test]
async fn test_conflicting_publish_over_http() {
    init_tracing();
    let server = MockServer::start().await;
    let issuer = Issuer::new(ISSUER, Tier::A, KeyType::Ed25519, 11);
    let signed = signed_claim(&issuer);

    Mock::given(method("POST"))
        .and(path("/claim"))
        .respond_with(ResponseTemplate::new(409).set_body_string("claim exists"))
        .expect(1)
        .mount(&server)
        .await;

    let service = ClaimService::from_config(&config_for(&server)).unwrap();
    let err = service
        .publish(Publication::Claim(&signed))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_config_file_drives_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verity.toml");
    std::fs::write(
        &path,
        "[registry]\nbase_url = \"http://registry.local:9000\"\nmax_attempts = 5\n\n[verifier]\nrequire_content_match = true\n",
    )
    .unwrap();

    let config = VerityConfig::load(&path).unwrap();
    assert_eq!(config.registry.max_attempts, 5);
    assert_eq!(config.registry.timeout_ms, 5_000);

    let service = ClaimService::from_config(&config).unwrap();
    assert!(service.default_options().require_content_match);
}
