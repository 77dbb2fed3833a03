//! HTTP reference implementations of the promotion and traffic-director
//! contracts.
//!
//! Both post a JSON body of `{region_id, fencing_token}` to a configured
//! endpoint. The receiving side is expected to be idempotent, per the
//! adapter contract. Connection failures, timeouts, and 5xx responses are
//! retryable; any other non-success status is fatal for the attempt.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use vigil_core::{
    FailoverError, FencingToken, PromotionAdapter, PromotionOutcome, RegionId, Result,
    TrafficDirector,
};

#[derive(Debug, Serialize)]
struct AdapterRequest<'a> {
    region_id: &'a str,
    fencing_token: u64,
}

async fn post_fenced(
    client: &reqwest::Client,
    url: &str,
    operation: &str,
    region_id: &RegionId,
    token: FencingToken,
    timeout: Duration,
) -> Result<reqwest::StatusCode> {
    let body = AdapterRequest {
        region_id: region_id.as_str(),
        fencing_token: token.value(),
    };

    let response = tokio::time::timeout(timeout, client.post(url).json(&body).send())
        .await
        .map_err(|_| FailoverError::timeout(operation.to_string()))?
        .map_err(|e| FailoverError::transient(operation, e.to_string()))?;

    Ok(response.status())
}

/// Promotion adapter backed by an RPC-style HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpPromotionAdapter {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpPromotionAdapter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            FailoverError::internal(format!("Failed to build promotion client: {}", e))
        })?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl PromotionAdapter for HttpPromotionAdapter {
    async fn promote(
        &self,
        region_id: &RegionId,
        token: FencingToken,
    ) -> Result<PromotionOutcome> {
        let status = post_fenced(
            &self.client,
            &self.url,
            "promote",
            region_id,
            token,
            self.timeout,
        )
        .await?;

        if status.is_success() {
            Ok(PromotionOutcome {
                new_role_confirmed: true,
            })
        } else if status.is_server_error() || status.as_u16() == 429 {
            Err(FailoverError::transient(
                "promote",
                format!("status {}", status),
            ))
        } else {
            Err(FailoverError::promotion_failed(
                region_id.clone(),
                format!("status {}", status),
            ))
        }
    }
}

/// Traffic director backed by an RPC-style HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTrafficDirector {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpTrafficDirector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            FailoverError::internal(format!("Failed to build traffic client: {}", e))
        })?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl TrafficDirector for HttpTrafficDirector {
    async fn redirect(&self, target: &RegionId, token: FencingToken) -> Result<()> {
        let status = post_fenced(
            &self.client,
            &self.url,
            "redirect",
            target,
            token,
            self.timeout,
        )
        .await?;

        if status.is_success() {
            Ok(())
        } else if status.is_server_error() || status.as_u16() == 429 {
            Err(FailoverError::transient(
                "redirect",
                format!("status {}", status),
            ))
        } else {
            Err(FailoverError::redirect_failed(
                target.clone(),
                format!("status {}", status),
            ))
        }
    }
}
