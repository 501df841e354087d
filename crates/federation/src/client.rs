//! HTTP client for `ActivityPub` fetches and deliveries.

use crate::activity::ActorDocument;
use crate::signature::HttpSigner;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const ACTIVITY_CONTENT_TYPE: &str = "application/activity+json";
const ACCEPT_HEADER: &str =
    "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";

#[derive(Debug, thiserror::Error)]
pub enum ApClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Remote returned {status} for {url}")]
    Status { status: StatusCode, url: String },
    #[error("Remote object is gone: {0}")]
    Gone(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Signing failed: {0}")]
    Signing(#[from] crate::signature::SignatureError),
}

/// `ActivityPub` HTTP client with bounded timeouts so a slow remote
/// server cannot hold a task indefinitely.
pub struct ApClient {
    client: reqwest::Client,
    user_agent: String,
}

impl ApClient {
    pub fn new(instance_host: &str, timeout_secs: u64) -> Result<Self, ApClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            user_agent: format!("Akari/{} (+https://{instance_host})", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Fetch a remote actor document.
    pub async fn fetch_actor(&self, uri: &str) -> Result<ActorDocument, ApClientError> {
        let value = self.fetch_object(uri).await?;
        let actor = serde_json::from_value(value).map_err(|e| {
            warn!(uri = %uri, error = %e, "Remote actor document has unexpected shape");
            ApClientError::Status {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                url: uri.to_string(),
            }
        })?;
        Ok(actor)
    }

    /// Fetch an arbitrary `ActivityPub` object as JSON.
    pub async fn fetch_object(&self, uri: &str) -> Result<Value, ApClientError> {
        debug!(uri = %uri, "Fetching remote object");

        let response = self
            .client
            .get(uri)
            .header("Accept", ACCEPT_HEADER)
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::GONE {
            return Err(ApClientError::Gone(uri.to_string()));
        }
        if !status.is_success() {
            return Err(ApClientError::Status {
                status,
                url: uri.to_string(),
            });
        }

        Ok(response.json().await?)
    }

    /// POST a signed activity to a remote inbox. A `410 Gone` response
    /// means the inbox owner is deleted and delivery should stop
    /// permanently, so it is distinguished from other failures.
    pub async fn post_signed(
        &self,
        inbox_url: &str,
        body: &[u8],
        signer: &HttpSigner,
    ) -> Result<(), ApClientError> {
        let url = Url::parse(inbox_url)?;
        let signed_headers = signer.sign_request("POST", &url, Some(body))?;

        debug!(inbox = %inbox_url, "Delivering activity");

        let response = self
            .client
            .post(url)
            .headers(signed_headers)
            .header("Content-Type", ACTIVITY_CONTENT_TYPE)
            .header("User-Agent", &self.user_agent)
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::GONE {
            return Err(ApClientError::Gone(inbox_url.to_string()));
        }
        if !status.is_success() {
            warn!(inbox = %inbox_url, status = %status, "Delivery rejected");
            return Err(ApClientError::Status {
                status,
                url: inbox_url.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_configured_timeout() {
        let client = ApClient::new("local.example", 5).unwrap();
        assert!(client.user_agent.contains("local.example"));
    }
}
