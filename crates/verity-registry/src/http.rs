//! HTTP transport for the registry API.
//!
//! Endpoints: `POST /diddoc`, `GET /diddoc/{id}`, `POST /claim`,
//! `GET /claim/{id}`. Bodies are JSON and decoded strictly; a body that
//! does not match the schema, or that names a different id than requested,
//! fails closed as [`RegistryError::Unavailable`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use verity_core::{ClaimId, Did, RegistryConfig};
use verity_identity::{Claim, DidDocument};

use crate::error::RegistryError;
use crate::retry::{with_retry, Failure, RetryPolicy};
use crate::{PublishAck, Registry};

const MAX_ERROR_BODY: usize = 256;

/// Retrying registry client. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: Url,
    policy: RetryPolicy,
}

impl HttpRegistry {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, RegistryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RegistryError::Config(format!("invalid base URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::Config(format!(
                "base URL cannot carry paths: {}",
                base_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            policy,
        })
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Self::new(
            &config.base_url,
            config.timeout(),
            RetryPolicy::from_config(config),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Join percent-encoded path segments onto the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::Config("base URL cannot carry paths".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        id: &str,
    ) -> Result<T, RegistryError> {
        with_retry(&self.policy, operation, || {
            let request = self.client.get(url.clone());
            async move {
                let resp = send(request).await?;
                let resp = check_status(resp, id).await?;
                decode(resp).await
            }
        })
        .await
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        operation: &'static str,
        url: Url,
        body: &B,
        id: &str,
    ) -> Result<PublishAck, RegistryError> {
        let ack: PublishAck = with_retry(&self.policy, operation, || {
            let request = self.client.post(url.clone()).json(body);
            async move {
                let resp = send(request).await?;
                let resp = check_status(resp, id).await?;
                decode(resp).await
            }
        })
        .await?;
        if ack.id != id {
            return Err(RegistryError::Unavailable {
                attempts: 1,
                reason: format!("acknowledgement names {} instead of {}", ack.id, id),
            });
        }
        Ok(ack)
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, Failure> {
    request.send().await.map_err(|e| {
        if e.is_builder() {
            Failure::Permanent(RegistryError::Config(e.to_string()))
        } else if e.is_timeout() {
            Failure::Transient(format!("timeout: {}", e))
        } else {
            Failure::Transient(format!("transport error: {}", e))
        }
    })
}

async fn check_status(resp: reqwest::Response, id: &str) -> Result<reqwest::Response, Failure> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    let reason = format!("HTTP {}: {}", status.as_u16(), body);
    Err(match status {
        s if s.is_server_error() => Failure::Transient(reason),
        StatusCode::NOT_FOUND => Failure::Permanent(RegistryError::NotFound(id.to_string())),
        StatusCode::CONFLICT => Failure::Permanent(RegistryError::Conflict(id.to_string())),
        s if s.is_client_error() => Failure::Permanent(RegistryError::Rejected {
            status: s.as_u16(),
            reason,
        }),
        _ => Failure::Malformed(format!("unexpected status: {}", reason)),
    })
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Failure> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Failure::Transient(format!("failed to read response body: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Failure::Malformed(format!("response does not match schema: {}", e)))
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn publish_did(&self, doc: &DidDocument) -> Result<PublishAck, RegistryError> {
        let url = self.endpoint(&["diddoc"])?;
        let ack = self
            .post_json("publish_did", url, doc, doc.id().uri())
            .await?;
        tracing::info!(did = %doc.id(), outcome = %ack.outcome, "DID document published");
        Ok(ack)
    }

    async fn fetch_did(&self, did: &Did) -> Result<DidDocument, RegistryError> {
        let url = self.endpoint(&["diddoc", did.uri()])?;
        let doc: DidDocument = self.get_json("fetch_did", url, did.uri()).await?;
        if doc.id() != did {
            return Err(RegistryError::Unavailable {
                attempts: 1,
                reason: format!("registry returned document {} for {}", doc.id(), did),
            });
        }
        tracing::debug!(did = %did, "DID document fetched");
        Ok(doc)
    }

    async fn publish_claim(&self, claim: &Claim) -> Result<PublishAck, RegistryError> {
        let url = self.endpoint(&["claim"])?;
        let ack = self
            .post_json("publish_claim", url, claim, claim.id.as_str())
            .await?;
        tracing::info!(claim_id = %claim.id, outcome = %ack.outcome, "claim published");
        Ok(ack)
    }

    async fn fetch_claim(&self, id: &ClaimId) -> Result<Claim, RegistryError> {
        let url = self.endpoint(&["claim", id.as_str()])?;
        let claim: Claim = self.get_json("fetch_claim", url, id.as_str()).await?;
        if claim.id != *id {
            return Err(RegistryError::Unavailable {
                attempts: 1,
                reason: format!("registry returned claim {} for {}", claim.id, id),
            });
        }
        tracing::debug!(claim_id = %id, "claim fetched");
        Ok(claim)
    }
}
