//! Bounded cache of raw upstream response bodies.
//!
//! Holds full-fetch bodies for a short time so a burst of cold misses for
//! the same competition reuses one download. At the entry ceiling the single
//! oldest entry (by store time) is evicted before inserting.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct RawEntry {
    body: String,
    stored_at: DateTime<Utc>,
}

pub struct RawResponseCache {
    entries: Mutex<HashMap<String, RawEntry>>,
    max_entries: usize,
    ttl: Duration,
}

impl RawResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    pub async fn get(&self, url: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .get(url)
            .filter(|e| Utc::now() - e.stored_at < self.ttl)
            .map(|e| e.body.clone())
    }

    pub async fn put(&self, url: &str, body: String) {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(url) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(url = %oldest, "Evicting oldest raw response");
                entries.remove(&oldest);
            }
        }
        entries.insert(
            url.to_string(),
            RawEntry {
                body,
                stored_at: Utc::now(),
            },
        );
    }

    pub async fn remove(&self, url: &str) -> bool {
        self.entries.lock().await.remove(url).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    #[cfg(test)]
    async fn backdate(&self, url: &str, by: Duration) {
        if let Some(entry) = self.entries.lock().await.get_mut(url) {
            entry.stored_at -= by;
        }
    }
}
