use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::CONFIG;
use crate::data_models::{ResultPage, params};
use crate::translator::xml_to_value;

/// Value forced into the `type` parameter on every upstream call.
const FIXED_FEED_TYPE: &str = "xml";

/// The single failure category the translator surfaces. Network errors,
/// timeouts, non-2xx upstream statuses and XML parse failures all land here.
#[derive(Debug, Error)]
#[error("search feed unavailable: {reason}")]
pub struct FeedUnavailable {
    reason: String,
}

impl FeedUnavailable {
    pub fn new(reason: impl Into<String>) -> FeedUnavailable {
        FeedUnavailable {
            reason: reason.into(),
        }
    }
}

/// Seam between the navigator and the upstream feed. Implemented by
/// `FeedClient` for the real feed and by in-memory fakes in tests.
pub trait SearchFeed: Send + Sync {
    /// Fetch one translated, normalized page for the given parameters.
    fn fetch(
        &self,
        params: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<ResultPage, FeedUnavailable>> + Send;
}

/// Stateless client for the upstream search-ads feed. One HTTP GET per call,
/// no retries, no caching.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    base_url: String,
    affiliate_id: String,
}

impl FeedClient {
    /// Create a client with an explicit endpoint and affiliate identity.
    /// Useful for testing against a local stand-in feed.
    pub fn new(base_url: &str, affiliate_id: &str, timeout: Duration) -> Result<FeedClient> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build feed HTTP client")?;

        Ok(FeedClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            affiliate_id: affiliate_id.to_string(),
        })
    }

    /// Create a client using environment configuration
    pub fn from_config() -> Result<FeedClient> {
        FeedClient::new(
            &CONFIG.feed_base_url,
            &CONFIG.affiliate_id,
            Duration::from_secs(CONFIG.request_timeout_secs),
        )
    }

    /// Fetch one page from the feed and translate the XML body into the
    /// generic nested mapping. Caller parameters pass through unmodified,
    /// except the reserved keys: the affiliate identity and feed type are
    /// forced here and cannot be overridden by the caller.
    pub async fn fetch_value(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, FeedUnavailable> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 2);
        for (key, value) in params {
            if key == params::AFFILIATE || key == params::FEED_TYPE {
                continue;
            }
            query.push((key, value));
        }
        query.push((params::AFFILIATE, &self.affiliate_id));
        query.push((params::FEED_TYPE, FIXED_FEED_TYPE));

        let url = format!("{}/search", self.base_url);
        log::debug!("fetching feed page: {url} ({} params)", query.len());

        let response = self
            .http
            .get(&url)
            .query(&query)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    log::error!("feed request timed out: {url}");
                    FeedUnavailable::new("request timed out")
                } else {
                    log::error!("feed request failed: {e:#}");
                    FeedUnavailable::new(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            log::error!("feed returned {status} for {url}");
            return Err(FeedUnavailable::new(format!("upstream status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedUnavailable::new(format!("failed to read body: {e}")))?;

        xml_to_value(&body).map_err(|e| {
            log::error!("feed response failed to translate: {e:#}");
            FeedUnavailable::new(format!("malformed feed response: {e}"))
        })
    }
}

impl SearchFeed for FeedClient {
    async fn fetch(&self, params: &BTreeMap<String, String>) -> Result<ResultPage, FeedUnavailable> {
        let value = self.fetch_value(params).await?;
        Ok(ResultPage::from_value(&value))
    }
}
