//! HTTP client for the upstream live-scoring provider.
//!
//! The provider's documents are scraped and field-mapped elsewhere; this
//! client consumes the mapped JSON (`{"stages": [...]}`) and hands back
//! `Stage` lists for the Sync Cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{CompetitionKey, Stage};

use super::{ApiError, RawResponseCache, ScoreSource};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) or 5xx responses.
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds between retries.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Raw full-fetch bodies kept at most this many at a time.
const DEFAULT_RAW_CACHE_ENTRIES: usize = 100;

/// Raw full-fetch bodies are reused for this many seconds.
const DEFAULT_RAW_CACHE_TTL_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct StagesResponse {
    #[serde(default)]
    stages: Vec<Stage>,
}

/// Tunables for `ScoreboardClient`.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub raw_cache_max_entries: usize,
    pub raw_cache_ttl: chrono::Duration,
}

impl ClientSettings {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            raw_cache_max_entries: DEFAULT_RAW_CACHE_ENTRIES,
            raw_cache_ttl: chrono::Duration::seconds(DEFAULT_RAW_CACHE_TTL_SECS),
        }
    }
}

/// Client for the scoreboard API.
/// Clone is cheap - reqwest::Client and the raw cache are shared.
#[derive(Clone)]
pub struct ScoreboardClient {
    client: Client,
    base_url: String,
    raw_cache: Arc<RawResponseCache>,
}

impl ScoreboardClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url,
            raw_cache: Arc::new(RawResponseCache::new(
                settings.raw_cache_max_entries,
                settings.raw_cache_ttl,
            )),
        })
    }

    pub fn stages_url(&self, key: &CompetitionKey) -> String {
        format!(
            "{}/{}/{}/stages",
            self.base_url, key.content_type, key.competition_id
        )
    }

    /// Check if response is successful, returning an error with body if not.
    /// Rate limits come back as `ApiError::RateLimited`.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Whether a failed attempt gets another try after `retries` retries.
    fn should_retry(error: &ApiError, retries: u32) -> bool {
        retries < MAX_RETRIES && error.is_retryable()
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .header(header::ACCEPT, "application/json")
                .query(query)
                .send()
                .await?;

            let error = match Self::check_response(response).await {
                Ok(response) => return Ok(response.text().await?),
                Err(e) => e,
            };
            if !Self::should_retry(&error, retries) {
                return Err(error);
            }
            retries += 1;
            warn!(url = url, retry = retries, backoff_ms = backoff_ms, error = %error, "Upstream request failed, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    fn parse_stages(body: &str) -> Result<Vec<Stage>, ApiError> {
        let parsed: StagesResponse = serde_json::from_str(body)
            .map_err(|e| ApiError::Data(format!("Failed to parse stages response: {}", e)))?;
        Ok(parsed.stages)
    }

    async fn fetch_full(&self, key: &CompetitionKey) -> Result<Vec<Stage>, ApiError> {
        let url = self.stages_url(key);
        if let Some(body) = self.raw_cache.get(&url).await {
            debug!(competition = %key, "Serving full fetch from raw response cache");
            return Self::parse_stages(&body);
        }

        let body = self.get_text(&url, &[]).await?;
        let stages = Self::parse_stages(&body)?;
        // Only cache bodies that mapped cleanly
        self.raw_cache.put(&url, body).await;
        Ok(stages)
    }

    async fn fetch_since(
        &self,
        key: &CompetitionKey,
        updated_after: DateTime<Utc>,
    ) -> Result<Vec<Stage>, ApiError> {
        let url = self.stages_url(key);
        let watermark = updated_after.to_rfc3339_opts(SecondsFormat::Millis, true);
        let body = self
            .get_text(&url, &[("updatedAfter", watermark)])
            .await?;
        let mut stages = Self::parse_stages(&body)?;

        // Some providers treat the watermark as inclusive
        for stage in &mut stages {
            stage.scorecards.retain(|s| s.updated > updated_after);
        }
        stages.retain(|s| !s.scorecards.is_empty());
        Ok(stages)
    }
}

#[async_trait]
impl ScoreSource for ScoreboardClient {
    async fn fetch_stages(
        &self,
        key: &CompetitionKey,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Stage>, ApiError> {
        match updated_after {
            None => self.fetch_full(key).await,
            Some(ts) => self.fetch_since(key, ts).await,
        }
    }

    async fn invalidate(&self, key: Option<&CompetitionKey>) {
        match key {
            Some(key) => {
                self.raw_cache.remove(&self.stages_url(key)).await;
            }
            None => self.raw_cache.clear().await,
        }
        debug!(competition = ?key.map(|k| k.to_string()), "Raw response cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_url_trims_trailing_slash() {
        let client = ScoreboardClient::new(ClientSettings::new("https://scores.example.com/api/")).unwrap();
        let key = CompetitionKey::new("ipsc", "m-1001").unwrap();
        assert_eq!(
            client.stages_url(&key),
            "https://scores.example.com/api/ipsc/m-1001/stages"
        );
    }

    #[test]
    fn test_retry_policy() {
        let unavailable = ApiError::from_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(ScoreboardClient::should_retry(&ApiError::RateLimited, 0));
        assert!(ScoreboardClient::should_retry(&unavailable, MAX_RETRIES - 1));
        assert!(!ScoreboardClient::should_retry(&unavailable, MAX_RETRIES));

        let missing = ApiError::from_status(reqwest::StatusCode::NOT_FOUND, "");
        assert!(!ScoreboardClient::should_retry(&missing, 0));
    }

    #[tokio::test]
    async fn test_invalidate_drops_cached_bodies() {
        let client = ScoreboardClient::new(ClientSettings::new("https://scores.example.com/api")).unwrap();
        let first = CompetitionKey::new("ipsc", "m-1").unwrap();
        let second = CompetitionKey::new("ipsc", "m-2").unwrap();
        client.raw_cache.put(&client.stages_url(&first), "{}".to_string()).await;
        client.raw_cache.put(&client.stages_url(&second), "{}".to_string()).await;

        client.invalidate(Some(&first)).await;
        assert!(client.raw_cache.get(&client.stages_url(&first)).await.is_none());
        assert!(client.raw_cache.get(&client.stages_url(&second)).await.is_some());

        client.invalidate(None).await;
        assert_eq!(client.raw_cache.len().await, 0);
    }

    #[test]
    fn test_parse_stages_maps_schema() {
        let body = r#"{"stages": [{"id": "a", "number": 2, "scorecards": []}]}"#;
        let stages = ScoreboardClient::parse_stages(body).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].id, "a");
        assert_eq!(stages[0].number, 2);
    }

    #[test]
    fn test_parse_stages_rejects_bad_schema() {
        let err = ScoreboardClient::parse_stages(r#"{"stages": [{"number": "x"}]}"#).unwrap_err();
        assert!(matches!(err, ApiError::Data(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_stages_missing_list_is_empty() {
        assert!(ScoreboardClient::parse_stages("{}").unwrap().is_empty());
    }
}
