//! HTTP metadata source
//!
//! Reads the repository server's REST endpoints. Each collection is one GET;
//! transient failures are retried with exponential backoff before the
//! collection is reported unavailable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::payload::decode_records;
use super::MetadataSource;
use crate::error::SourceError;
use crate::model::{Collection, RawRecord};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;
const ERROR_BODY_LIMIT: usize = 200;

/// Endpoint path, relative to the server base URL.
pub fn endpoint(collection: Collection) -> &'static str {
    match collection {
        Collection::Operations => "api/v1/automation",
        Collection::DocumentTypes => "api/v1/config/types",
        Collection::Schemas => "api/v1/config/schemas",
        Collection::Facets => "api/v1/config/facets",
    }
}

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least 1
    pub max_attempts: u32,
    /// Delay after the first failure (doubles on each retry)
    pub initial_backoff: Duration,
    /// Maximum delay cap
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `failed + 1`, after `failed` failures.
    pub fn backoff_for(&self, failed: u32) -> Duration {
        let exponent = failed.saturating_sub(1).min(31);
        let delay = self.initial_backoff.saturating_mul(2u32.pow(exponent));
        delay.min(self.max_backoff)
    }
}

/// Metadata source backed by the server's REST API.
pub struct HttpMetadataSource {
    client: Client,
    base_url: Url,
    credentials: Option<(String, Option<String>)>,
    retry: RetryPolicy,
}

impl HttpMetadataSource {
    /// Create a source for `base_url` (e.g. `http://localhost:8080/nuxeo`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let mut base_url = Url::parse(base_url)?;
        // `Url::join` replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("metaconst/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            credentials: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL for one collection.
    pub fn url_for(&self, collection: Collection) -> Result<Url, SourceError> {
        Ok(self.base_url.join(endpoint(collection))?)
    }

    async fn get_once(&self, url: &Url) -> Result<Value, SourceError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status,
                url: url.to_string(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        Ok(response.json::<Value>().await?)
    }

    async fn get_with_retry(&self, collection: Collection, url: &Url) -> Result<Value, SourceError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.get_once(url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        collection = %collection,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Metadata request failed, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(e) if attempt > 1 && e.is_retryable() => {
                    return Err(SourceError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    fn describe(&self) -> String {
        // Never leak userinfo into the generated file
        let mut url = self.base_url.clone();
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url.to_string()
    }

    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRecord>, SourceError> {
        let url = self.url_for(collection)?;
        debug!(collection = %collection, url = %url, "Fetching metadata");

        let payload = self.get_with_retry(collection, &url).await?;
        let records = decode_records(collection, &payload)?;

        info!(
            collection = %collection,
            records = records.len(),
            "Fetched metadata collection"
        );
        Ok(records)
    }
}
