//! Short-TTL memoization of computed stage lists.
//!
//! Absorbs bursts of identical client polls: within the TTL every caller
//! gets the same stored `Arc`. Entries are replaced wholesale, never merged.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{CompetitionKey, Stage};

/// Default time-to-live for a computed response.
const DEFAULT_TTL_SECS: i64 = 10;

pub type SharedStages = Arc<Vec<Stage>>;

/// Deterministic cache key for (content type, competition id, division).
pub fn response_key(key: &CompetitionKey, division: Option<&str>) -> String {
    let division = division
        .map(|d| d.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "*".to_string());
    format!("{}:{}:{}", key.content_type, key.competition_id, division)
}

#[derive(Debug, Clone)]
struct ResponseEntry {
    stages: SharedStages,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseCacheStats {
    pub size: usize,
    pub ttl_secs: i64,
}

pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, ResponseEntry>>,
    // Per-key locks for get_or_try_insert_with
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn is_live(&self, entry: &ResponseEntry, now: DateTime<Utc>) -> bool {
        now - entry.stored_at < self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<SharedStages> {
        let now = Utc::now();
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|e| self.is_live(e, now))
            .map(|e| e.stages.clone())
    }

    pub async fn put(&self, key: &str, stages: SharedStages) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            ResponseEntry {
                stages,
                stored_at: Utc::now(),
            },
        );
    }

    /// Return the cached value, or run `compute` and store its result.
    /// Concurrent callers for the same key wait for the first one instead
    /// of computing again. Errors are returned and nothing is stored.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: &str,
        compute: F,
    ) -> Result<SharedStages, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Stage>, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let lock = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        let result = match self.get(key).await {
            Some(hit) => Ok(hit),
            None => match compute().await {
                Ok(stages) => {
                    let stages = Arc::new(stages);
                    self.put(key, stages.clone()).await;
                    Ok(stages)
                }
                Err(e) => Err(e),
            },
        };

        let mut inflight = self.inflight.lock().await;
        // Only the map and this guard's owner hold it once nobody is waiting
        if Arc::strong_count(&lock) <= 2 {
            inflight.remove(key);
        }
        result
    }

    /// Size and TTL. Expired entries are evicted as a side effect.
    pub async fn stats(&self) -> ResponseCacheStats {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| now - e.stored_at < self.ttl);
        if entries.len() < before {
            debug!(evicted = before - entries.len(), "Evicted expired responses");
        }
        ResponseCacheStats {
            size: entries.len(),
            ttl_secs: self.ttl.num_seconds(),
        }
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    #[cfg(test)]
    async fn backdate(&self, key: &str, by: Duration) {
        if let Some(entry) = self.entries.lock().await.get_mut(key) {
            entry.stored_at -= by;
        }
    }
}
