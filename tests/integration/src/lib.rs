//! Fixtures shared by the end-to-end scenarios.

use std::sync::{Arc, Once};

use verity_claims::{ClaimService, Publication};
use verity_core::{Did, Tier};
use verity_crypto::{KeyPair, KeyType};
use verity_identity::{DidDocument, MethodSpec};
use verity_registry::InMemoryRegistry;

pub const ISSUER: &str = "did:example:org";
pub const METHOD: &str = "key-1";
pub const MESSAGE: &str = "Election result verified";

static TRACING: Once = Once::new();

/// Route `tracing` output through the test writer. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An issuer: its key pair and a DID document listing it as `key-1`.
pub struct Issuer {
    pub keypair: KeyPair,
    pub document: DidDocument,
}

impl Issuer {
    pub fn new(did: &str, tier: Tier, key_type: KeyType, seed: u8) -> Self {
        let keypair = KeyPair::from_secret_bytes(key_type, &[seed; 32])
            .expect("fixed seed is a valid secret key");
        let document = DidDocument::with_id(
            Did::new(did).expect("fixture DID is valid"),
            tier,
            vec![MethodSpec::from_key(METHOD, &keypair.public_key())],
        )
        .expect("fixture document is valid");
        Self { keypair, document }
    }

    pub fn secret(&self) -> [u8; 32] {
        *self.keypair.secret_bytes()
    }
}

/// A service over a fresh in-memory registry with the issuer's document published.
pub async fn service_with_issuer(issuer: &Issuer) -> (ClaimService, Arc<InMemoryRegistry>) {
    init_tracing();
    let registry = Arc::new(InMemoryRegistry::new());
    let service = ClaimService::new(registry.clone());
    service
        .publish(Publication::DidDocument(&issuer.document))
        .await
        .expect("publishing the issuer document");
    (service, registry)
}
