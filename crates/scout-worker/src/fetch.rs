//! Target fetching.
//!
//! [`Fetcher`] is the seam between the task executor and HTTP so tests can
//! swap in scripted fetchers. [`ReqwestFetcher`] is the production client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use scout_settings::FetchSettings;
use thiserror::Error;

/// Why a fetch produced no body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connecting to or requesting the target failed.
    #[error("failed to access {url}: {message}")]
    Access {
        /// The requested URL.
        url: String,
        /// Transport error text.
        message: String,
    },
    /// A response arrived but its body could not be read.
    #[error("failed to read response body: {0}")]
    Read(String),
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Retrieves the body at a URL.
///
/// HTTP status codes are not errors: any response whose body can be read is
/// returned as-is.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a GET against `url` and return the full body.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetcher backed by `reqwest`.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client from fetch settings.
    ///
    /// With `accept_invalid_certs` set, TLS peer verification of targets is
    /// disabled. Without `timeout_ms` a stalled target holds its task (and
    /// its admission slot) indefinitely.
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .danger_accept_invalid_certs(settings.accept_invalid_certs);
        if let Some(ms) = settings.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Access {
                url: url.to_owned(),
                message: e.to_string(),
            })?;

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Read(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
