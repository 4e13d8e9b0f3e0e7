//! Ordered verification pipeline.
//!
//! Steps run strictly in order: `claim_fetch`, `issuer_resolution`,
//! `method_resolution`, `content_match` (only with presented content),
//! `signature_check`, `registration_check`. A failed terminal step marks the
//! remaining steps as skipped. Not being verified is an outcome, never an
//! error: every path returns a [`VerificationResult`].

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use verity_core::{ClaimId, Tier, VerifierConfig};
use verity_crypto::{PublicKey, Signature};
use verity_identity::{canonicalize_versioned, Claim, ClaimProof, PresentedContent};
use verity_registry::{Registry, RegistryError};

use crate::result::{Step, StepOutcome, Steps, VerificationResult, RESULT_SCHEMA_VERSION};

/// What to verify.
#[derive(Debug, Clone)]
pub enum VerifyTarget {
    Id(ClaimId),
    /// A claim id or a verification URL, parsed during verification.
    Reference(String),
    /// A locally held claim, checked against the registered copy.
    Claim(Box<Claim>),
}

impl From<ClaimId> for VerifyTarget {
    fn from(id: ClaimId) -> Self {
        Self::Id(id)
    }
}

impl From<Claim> for VerifyTarget {
    fn from(claim: Claim) -> Self {
        Self::Claim(Box::new(claim))
    }
}

impl From<&str> for VerifyTarget {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_string())
    }
}

impl From<String> for VerifyTarget {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

impl VerifyTarget {
    fn label(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Reference(r) => r.trim().to_string(),
            Self::Claim(c) => c.id.to_string(),
        }
    }
}

/// Public verification link for a claim: `<base>/verify/claim/<id>`.
pub fn verification_url(base_url: &str, id: &ClaimId) -> String {
    format!("{}/verify/claim/{}", base_url.trim_end_matches('/'), id)
}

/// Extract a claim id from a bare id, a `.../verify/claim/<id>` URL, or a
/// URL carrying `?claim_id=<id>`.
pub fn parse_reference(reference: &str) -> Option<ClaimId> {
    let reference = reference.trim();
    if let Ok(id) = ClaimId::parse(reference) {
        return Some(id);
    }
    let url = Url::parse(reference).ok()?;
    if let Some((_, value)) = url.query_pairs().find(|(k, _)| k == "claim_id") {
        return ClaimId::parse(&value).ok();
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments
        .windows(2)
        .rev()
        .find(|pair| pair[0] == "claim")
        .and_then(|pair| ClaimId::parse(pair[1]).ok())
}

/// Per-call verification options.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Content to compare against the claim (runs `content_match`).
    pub presented_content: Option<PresentedContent>,
    /// Make `content_match` gate the verdict.
    pub require_content_match: bool,
    /// Deadline for the whole call.
    pub timeout: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::from_config(&VerifierConfig::default())
    }
}

impl VerifyOptions {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            presented_content: None,
            require_content_match: config.require_content_match,
            timeout: config.timeout(),
        }
    }

    pub fn with_content(mut self, content: PresentedContent) -> Self {
        self.presented_content = Some(content);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn require_content_match(mut self, required: bool) -> Self {
        self.require_content_match = required;
        self
    }

    fn content_match_applies(&self) -> bool {
        self.presented_content.is_some() || self.require_content_match
    }
}

/// Mutable evaluation state, shared by reference with the running steps so
/// that a timeout keeps whatever has completed.
struct Evaluation {
    plan: Vec<Step>,
    claim_id: String,
    issuer: Option<String>,
    issuer_name: Option<String>,
    verification_method: Option<String>,
    content_hash: Option<String>,
    tier: Option<Tier>,
    steps: Steps,
    details: BTreeMap<String, String>,
    error_message: Option<String>,
}

impl Evaluation {
    fn new(claim_id: String, options: &VerifyOptions) -> Self {
        let plan = Step::ALL
            .into_iter()
            .filter(|s| *s != Step::ContentMatch || options.content_match_applies())
            .collect();
        Self {
            plan,
            claim_id,
            issuer: None,
            issuer_name: None,
            verification_method: None,
            content_hash: None,
            tier: None,
            steps: Steps::default(),
            details: BTreeMap::new(),
            error_message: None,
        }
    }

    fn pass(&mut self, step: Step) {
        tracing::debug!(claim_id = %self.claim_id, step = %step, "step passed");
        self.steps.record(step, StepOutcome::Passed);
    }

    /// Record a failure. A terminal step also skips everything after it.
    fn fail(&mut self, step: Step, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(claim_id = %self.claim_id, step = %step, reason = %reason, "step failed");
        if self.steps.record(step, StepOutcome::Failed) {
            self.details.insert(step.name().to_string(), reason);
        }
        if step.is_terminal() {
            self.skip_remaining(&format!("skipped after {} failed", step));
        }
    }

    /// Fail a step on a registry error. Anything but "not found" means the
    /// evaluation could not complete.
    fn fail_registry(&mut self, step: Step, error: &RegistryError) {
        if !matches!(error, RegistryError::NotFound(_)) {
            self.error_message.get_or_insert_with(|| error.to_string());
        }
        self.fail(step, error.to_string());
    }

    /// Mark every planned step not yet recorded as skipped.
    fn skip_remaining(&mut self, reason: &str) {
        for step in self.plan.clone() {
            if self.steps.record(step, StepOutcome::Skipped) {
                self.details.insert(step.name().to_string(), reason.to_string());
            }
        }
    }

    fn finish(self, require_content_match: bool) -> VerificationResult {
        let verified = self.error_message.is_none()
            && self.plan.iter().all(|step| {
                (*step == Step::ContentMatch && !require_content_match)
                    || self.steps.get(*step) == Some(StepOutcome::Passed)
            });
        VerificationResult {
            schema_version: RESULT_SCHEMA_VERSION,
            claim_id: self.claim_id,
            issuer: self.issuer,
            issuer_name: self.issuer_name,
            verification_method: self.verification_method,
            content_hash: self.content_hash,
            verified,
            verification_tier: if verified { self.tier } else { None },
            steps: self.steps,
            details: self.details,
            verification_time: Utc::now(),
            error_message: self.error_message,
        }
    }
}

/// Runs the verification steps against a registry.
#[derive(Clone)]
pub struct VerificationPipeline {
    registry: Arc<dyn Registry>,
    defaults: VerifyOptions,
}

impl VerificationPipeline {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            defaults: VerifyOptions::default(),
        }
    }

    pub fn with_config(registry: Arc<dyn Registry>, config: &VerifierConfig) -> Self {
        Self {
            registry,
            defaults: VerifyOptions::from_config(config),
        }
    }

    /// Options built from this pipeline's configuration.
    pub fn default_options(&self) -> VerifyOptions {
        self.defaults.clone()
    }

    /// Verify a claim. Never fails; problems are reported in the result.
    pub async fn verify(
        &self,
        target: impl Into<VerifyTarget>,
        options: &VerifyOptions,
    ) -> VerificationResult {
        let target = target.into();
        let mut eval = Evaluation::new(target.label(), options);

        let run = self.run(target, options, &mut eval);
        if tokio::time::timeout(options.timeout, run).await.is_err() {
            tracing::warn!(
                claim_id = %eval.claim_id,
                timeout_ms = options.timeout.as_millis() as u64,
                "verification timed out"
            );
            eval.error_message = Some("timeout".into());
            eval.skip_remaining("verification timed out");
        }

        let result = eval.finish(options.require_content_match);
        tracing::info!(
            claim_id = %result.claim_id,
            verified = result.verified,
            tier = ?result.verification_tier,
            "claim verification finished"
        );
        result
    }

    async fn run(&self, target: VerifyTarget, options: &VerifyOptions, eval: &mut Evaluation) {
        let (requested, presented) = match target {
            VerifyTarget::Id(id) => (id, None),
            VerifyTarget::Reference(raw) => match parse_reference(&raw) {
                Some(id) => (id, None),
                None => {
                    eval.fail(Step::ClaimFetch, "not a claim id or verification URL");
                    return;
                }
            },
            VerifyTarget::Claim(claim) => (claim.id.clone(), Some(*claim)),
        };
        eval.claim_id = requested.to_string();

        // claim_fetch, with the issuer document fetched alongside when the
        // issuer is already known.
        let (fetched, prefetched_doc) = match &presented {
            Some(local) => {
                let (claim, doc) = tokio::join!(
                    self.registry.fetch_claim(&requested),
                    self.registry.fetch_did(&local.issuer)
                );
                (claim, Some(doc))
            }
            None => (self.registry.fetch_claim(&requested).await, None),
        };
        let registered = match fetched {
            Ok(claim) => claim,
            Err(e) => {
                eval.fail_registry(Step::ClaimFetch, &e);
                return;
            }
        };
        eval.pass(Step::ClaimFetch);

        let claim = presented.clone().unwrap_or_else(|| registered.clone());
        eval.issuer = Some(claim.issuer.to_string());
        eval.content_hash = Some(claim.content.content_hash());

        // issuer_resolution
        let doc_result = match prefetched_doc {
            Some(result) => result,
            None => self.registry.fetch_did(&claim.issuer).await,
        };
        let document = match doc_result {
            Ok(doc) if *doc.id() == claim.issuer => doc,
            Ok(doc) => {
                eval.fail(
                    Step::IssuerResolution,
                    format!("registry returned {} for issuer {}", doc.id(), claim.issuer),
                );
                return;
            }
            Err(e) => {
                eval.fail_registry(Step::IssuerResolution, &e);
                return;
            }
        };
        eval.tier = Some(document.tier());
        eval.issuer_name = document.organization_name().map(str::to_string);
        eval.pass(Step::IssuerResolution);

        // method_resolution
        let Some(proof) = claim.proof.as_ref() else {
            eval.fail(Step::MethodResolution, "claim is not signed");
            return;
        };
        let resolved = document
            .resolve(&proof.verification_method_id)
            .and_then(|method| Ok((method.id.clone(), method.public_key()?)));
        let key = match resolved {
            Ok((method_id, key)) => {
                eval.verification_method = Some(method_id);
                key
            }
            Err(e) => {
                eval.fail(Step::MethodResolution, e.to_string());
                return;
            }
        };
        eval.pass(Step::MethodResolution);

        // content_match (advisory)
        match &options.presented_content {
            Some(content) => match claim.content.matches(content) {
                Ok(true) => eval.pass(Step::ContentMatch),
                Ok(false) => eval.fail(
                    Step::ContentMatch,
                    "presented content does not match the claim",
                ),
                Err(e) => eval.fail(
                    Step::ContentMatch,
                    format!("presented content could not be read: {}", e),
                ),
            },
            None if options.require_content_match => eval.fail(
                Step::ContentMatch,
                "content-bound verification requested but no content was presented",
            ),
            None => {}
        }

        // signature_check
        if let Err(reason) = check_signature(&claim, proof, &key) {
            eval.fail(Step::SignatureCheck, reason);
            return;
        }
        eval.pass(Step::SignatureCheck);

        // registration_check
        let mut problems = Vec::new();
        if !claim.has_consistent_id() {
            problems.push("claim id does not match its fields");
        }
        if registered.id != requested {
            problems.push("registered copy has a different id than requested");
        }
        if presented.is_some_and(|local| local != registered) {
            problems.push("presented claim differs from the registered copy");
        }
        if problems.is_empty() {
            eval.pass(Step::RegistrationCheck);
        } else {
            eval.fail(Step::RegistrationCheck, problems.join("; "));
        }
    }
}

fn check_signature(claim: &Claim, proof: &ClaimProof, key: &PublicKey) -> Result<(), String> {
    let payload = canonicalize_versioned(claim, proof.canonicalization_version)
        .map_err(|e| e.to_string())?;
    let signature = Signature::from_hex(&proof.signature).map_err(|e| e.to_string())?;
    verity_crypto::verify(payload.as_bytes(), &signature, key)
        .map_err(|_| "signature does not verify against the resolved key".to_string())
}
