use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use verity_core::types::normalize_entity;
use verity_core::{CoreError, Did, Tier};
use verity_crypto::{KeyPair, KeyType, PublicKey, Signature};

use crate::canonical::canonicalize_document;
use crate::error::IdentityError;

/// Key suite of a verification method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationMethodType {
    Ed25519VerificationKey2020,
    EcdsaSecp256k1VerificationKey2019,
}

impl VerificationMethodType {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Ed25519VerificationKey2020 => KeyType::Ed25519,
            Self::EcdsaSecp256k1VerificationKey2019 => KeyType::Secp256k1,
        }
    }

    pub fn for_key_type(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Ed25519 => Self::Ed25519VerificationKey2020,
            KeyType::Secp256k1 => Self::EcdsaSecp256k1VerificationKey2019,
        }
    }
}

/// A verification method within a DID Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationMethod {
    /// Full method id (e.g., "did:verity:demo:org#key-1").
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: VerificationMethodType,
    /// The DID that controls this verification method.
    pub controller: Did,
    /// Hex or multibase (`z...`) encoded public key material.
    pub public_key: String,
}

impl VerificationMethod {
    /// The part after `#`.
    pub fn fragment(&self) -> &str {
        fragment_of(&self.id)
    }

    pub fn public_key(&self) -> Result<PublicKey, IdentityError> {
        PublicKey::decode(self.method_type.key_type(), &self.public_key).map_err(|e| {
            IdentityError::InvalidMethod {
                id: self.id.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// A verification method to add to a document. `id` may be a bare fragment
/// (`key-1`), `#key-1`, or a full id under the document's DID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub id: String,
    pub method_type: VerificationMethodType,
    pub public_key: String,
}

impl MethodSpec {
    /// Method for an already decoded key, stored as hex.
    pub fn from_key(id: impl Into<String>, key: &PublicKey) -> Self {
        Self {
            id: id.into(),
            method_type: VerificationMethodType::for_key_type(key.key_type()),
            public_key: key.to_hex(),
        }
    }
}

/// Input to [`DidDocument::create`].
#[derive(Debug, Clone)]
pub struct DidDocumentRequest {
    pub organization_name: String,
    pub namespace: String,
    /// Derived from `organization_name` when absent.
    pub entity_identifier: Option<String>,
    pub jurisdiction: Option<String>,
    pub tier: Tier,
    pub verification_methods: Vec<MethodSpec>,
}

/// Self-signature over a document's canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentProof {
    pub verification_method_id: String,
    pub signature: String,
    pub signed_at: DateTime<Utc>,
}

/// Issuer identity document.
///
/// Fields are private so that every mutation goes through a method that
/// bumps `updated_at` and drops a stale self-signature. The tier has no
/// setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDidDocument")]
pub struct DidDocument {
    id: Did,
    controller: Did,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jurisdiction: Option<String>,
    tier: Tier,
    verification_method: Vec<VerificationMethod>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proof: Option<DocumentProof>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDidDocument {
    id: Did,
    controller: Did,
    #[serde(default)]
    organization_name: Option<String>,
    #[serde(default)]
    jurisdiction: Option<String>,
    tier: Tier,
    verification_method: Vec<VerificationMethod>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    proof: Option<DocumentProof>,
}

impl TryFrom<RawDidDocument> for DidDocument {
    type Error = IdentityError;

    fn try_from(raw: RawDidDocument) -> Result<Self, Self::Error> {
        let mut seen = Vec::with_capacity(raw.verification_method.len());
        for vm in &raw.verification_method {
            let (did, fragment) = split_method_id(&vm.id)?;
            if did != Some(raw.id.uri()) {
                return Err(IdentityError::InvalidMethod {
                    id: vm.id.clone(),
                    reason: format!("method id is not under {}", raw.id),
                });
            }
            if seen.contains(&fragment) {
                return Err(IdentityError::DuplicateMethod(vm.id.clone()));
            }
            seen.push(fragment);
            vm.public_key()?;
        }
        if raw.updated_at < raw.created_at {
            return Err(IdentityError::Core(CoreError::ValidationError(
                "updated_at precedes created_at".into(),
            )));
        }
        Ok(Self {
            id: raw.id,
            controller: raw.controller,
            organization_name: raw.organization_name,
            jurisdiction: raw.jurisdiction,
            tier: raw.tier,
            verification_method: raw.verification_method,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            proof: raw.proof,
        })
    }
}

fn fragment_of(id: &str) -> &str {
    id.rsplit_once('#').map_or(id, |(_, frag)| frag)
}

/// Split a method reference into its optional DID part and its fragment.
fn split_method_id(id: &str) -> Result<(Option<&str>, &str), IdentityError> {
    let id = id.trim();
    let (did, fragment) = match id.split_once('#') {
        Some(("", frag)) => (None, frag),
        Some((did, frag)) => (Some(did), frag),
        None => (None, id),
    };
    let valid = !fragment.is_empty()
        && fragment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid {
        return Err(IdentityError::InvalidMethod {
            id: id.to_string(),
            reason: "fragment must be non-empty and use [A-Za-z0-9._-]".into(),
        });
    }
    Ok((did, fragment))
}

impl DidDocument {
    /// Create a `did:verity:<namespace>:<entity>` document.
    pub fn create(request: DidDocumentRequest) -> Result<Self, IdentityError> {
        let organization_name = request.organization_name.trim().to_string();
        if organization_name.is_empty() {
            return Err(IdentityError::Core(CoreError::ValidationError(
                "organization_name is empty".into(),
            )));
        }
        let entity = match request.entity_identifier {
            Some(entity) => entity.trim().to_string(),
            None => normalize_entity(&organization_name),
        };
        let id = Did::from_parts(request.namespace.trim(), &entity)?;

        let mut doc = Self::with_id(id, request.tier, request.verification_methods)?;
        doc.organization_name = Some(organization_name);
        doc.jurisdiction = request
            .jurisdiction
            .map(|j| j.trim().to_string())
            .filter(|j| !j.is_empty());

        tracing::info!(
            did = %doc.id,
            tier = %doc.tier,
            methods = doc.verification_method.len(),
            "DID document created"
        );
        Ok(doc)
    }

    /// Create a document for an externally chosen DID.
    pub fn with_id(id: Did, tier: Tier, methods: Vec<MethodSpec>) -> Result<Self, IdentityError> {
        let now = crate::now();
        let mut doc = Self {
            controller: id.clone(),
            id,
            organization_name: None,
            jurisdiction: None,
            tier,
            verification_method: Vec::with_capacity(methods.len()),
            created_at: now,
            updated_at: now,
            proof: None,
        };
        for spec in methods {
            let vm = doc.prepare_method(spec)?;
            doc.verification_method.push(vm);
        }
        Ok(doc)
    }

    fn prepare_method(&self, spec: MethodSpec) -> Result<VerificationMethod, IdentityError> {
        let (did, fragment) = split_method_id(&spec.id)?;
        if did.is_some_and(|d| d != self.id.uri()) {
            return Err(IdentityError::InvalidMethod {
                id: spec.id.clone(),
                reason: format!("method id is not under {}", self.id),
            });
        }
        if self.verification_method.iter().any(|vm| vm.fragment() == fragment) {
            return Err(IdentityError::DuplicateMethod(format!("{}#{}", self.id, fragment)));
        }
        let vm = VerificationMethod {
            id: format!("{}#{}", self.id, fragment),
            method_type: spec.method_type,
            controller: self.id.clone(),
            public_key: spec.public_key.trim().to_string(),
        };
        if vm.public_key.is_empty() {
            return Err(IdentityError::InvalidMethod {
                id: vm.id,
                reason: "public key is empty".into(),
            });
        }
        vm.public_key()?;
        Ok(vm)
    }

    pub fn id(&self) -> &Did {
        &self.id
    }

    pub fn controller(&self) -> &Did {
        &self.controller
    }

    pub fn organization_name(&self) -> Option<&str> {
        self.organization_name.as_deref()
    }

    pub fn jurisdiction(&self) -> Option<&str> {
        self.jurisdiction.as_deref()
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn verification_methods(&self) -> &[VerificationMethod] {
        &self.verification_method
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn proof(&self) -> Option<&DocumentProof> {
        self.proof.as_ref()
    }

    /// Resolve a verification method by full id, `#fragment`, or bare fragment.
    pub fn resolve(&self, vm_id: &str) -> Result<&VerificationMethod, IdentityError> {
        let not_found = || IdentityError::MethodNotFound(vm_id.to_string());
        let (did, fragment) = split_method_id(vm_id).map_err(|_| not_found())?;
        if did.is_some_and(|d| d != self.id.uri()) {
            return Err(not_found());
        }
        self.verification_method
            .iter()
            .find(|vm| vm.fragment() == fragment)
            .ok_or_else(not_found)
    }

    /// Resolve a method and decode its public key.
    pub fn public_key_for(&self, vm_id: &str) -> Result<PublicKey, IdentityError> {
        self.resolve(vm_id)?.public_key()
    }

    pub fn add_verification_method(&mut self, spec: MethodSpec) -> Result<(), IdentityError> {
        let vm = self.prepare_method(spec)?;
        tracing::info!(did = %self.id, method = %vm.id, "verification method added");
        self.verification_method.push(vm);
        self.touch();
        Ok(())
    }

    /// Remove a method. Claims signed with it stop resolving.
    pub fn remove_verification_method(
        &mut self,
        vm_id: &str,
    ) -> Result<VerificationMethod, IdentityError> {
        let full_id = self.resolve(vm_id)?.id.clone();
        let pos = self
            .verification_method
            .iter()
            .position(|vm| vm.id == full_id)
            .ok_or_else(|| IdentityError::MethodNotFound(vm_id.to_string()))?;
        let removed = self.verification_method.remove(pos);
        tracing::info!(did = %self.id, method = %removed.id, "verification method removed");
        self.touch();
        Ok(removed)
    }

    /// Advance `updated_at` strictly, even for mutations within the same
    /// microsecond, and drop the now stale self-signature.
    fn touch(&mut self) {
        let now = crate::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
        self.proof = None;
    }

    /// Sign the document with one of its own methods.
    pub fn self_sign(&mut self, secret: &[u8], vm_id: &str) -> Result<(), IdentityError> {
        let vm = self.resolve(vm_id)?;
        let vm_full_id = vm.id.clone();
        let expected = vm.public_key()?;
        let keypair = KeyPair::from_secret_bytes(expected.key_type(), secret)?;
        if keypair.public_key() != expected {
            return Err(IdentityError::KeyMismatch(vm_full_id));
        }

        let payload = canonicalize_document(self)?;
        let signature = verity_crypto::sign(payload.as_bytes(), &keypair)?;
        self.proof = Some(DocumentProof {
            verification_method_id: vm_full_id,
            signature: signature.to_hex(),
            signed_at: crate::now(),
        });
        tracing::info!(did = %self.id, "DID document self-signed");
        Ok(())
    }

    /// Check the self-signature against the document's current contents.
    pub fn verify_self_signature(&self) -> Result<(), IdentityError> {
        let proof = self
            .proof
            .as_ref()
            .ok_or_else(|| IdentityError::InvalidProof("document is not self-signed".into()))?;
        let key = self.public_key_for(&proof.verification_method_id)?;
        let signature = Signature::from_hex(&proof.signature)?;
        let payload = canonicalize_document(self)?;
        verity_crypto::verify(payload.as_bytes(), &signature, &key)?;
        Ok(())
    }
}
