//! Snapshot cache with incremental sync against the upstream provider.
//!
//! One entry per competition holds the latest full `Stage` snapshot and the
//! newest `updated` watermark seen in it. A fresh entry is refreshed with an
//! incremental fetch of rows changed after the watermark; an entry past
//! `max_age` is replaced by a full fetch. Entries idle longer than
//! `idle_eviction` are swept on every `get`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ScoreSource};
use crate::models::{latest_update, scorecard_count, CompetitionKey, Stage};

/// Full refetch once a snapshot is this old (3 days).
const DEFAULT_MAX_AGE_HOURS: i64 = 72;

/// Entries untouched for this long are evicted (1 hour).
const DEFAULT_IDLE_EVICTION_MINUTES: i64 = 60;

/// Deadline for a single upstream call.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub max_age: Duration,
    pub idle_eviction: Duration,
    pub fetch_timeout: std::time::Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(DEFAULT_MAX_AGE_HOURS),
            idle_eviction: Duration::minutes(DEFAULT_IDLE_EVICTION_MINUTES),
            fetch_timeout: std::time::Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
struct SyncEntry {
    stages: Vec<Stage>,
    latest_update: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
}

/// Copy of the entry bookkeeping kept next to the slot so stats and the
/// idle sweep never wait on an in-flight fetch.
#[derive(Debug, Clone, Copy)]
struct EntrySummary {
    fetched_at: DateTime<Utc>,
    latest_update: Option<DateTime<Utc>>,
    scorecard_count: usize,
}

impl From<&SyncEntry> for EntrySummary {
    fn from(entry: &SyncEntry) -> Self {
        Self {
            fetched_at: entry.fetched_at,
            latest_update: entry.latest_update,
            scorecard_count: scorecard_count(&entry.stages),
        }
    }
}

struct Slot {
    accessed_at: DateTime<Utc>,
    summary: Option<EntrySummary>,
    // Held across the whole fetch/merge cycle for this key
    state: Arc<Mutex<Option<SyncEntry>>>,
}

impl Slot {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            accessed_at: now,
            summary: None,
            state: Arc::new(Mutex::new(None)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncEntryStats {
    pub key: CompetitionKey,
    pub age_secs: i64,
    pub idle_secs: i64,
    pub scorecard_count: usize,
    pub latest_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncCacheStats {
    pub count: usize,
    pub entries: Vec<SyncEntryStats>,
}

pub struct SyncCache {
    source: Arc<dyn ScoreSource>,
    settings: SyncSettings,
    slots: Mutex<HashMap<CompetitionKey, Slot>>,
}

impl SyncCache {
    pub fn new(source: Arc<dyn ScoreSource>, settings: SyncSettings) -> Self {
        Self {
            source,
            settings,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Current snapshot for a competition, optionally projected to one
    /// division. The stored snapshot is always the unfiltered superset.
    pub async fn get(
        &self,
        key: &CompetitionKey,
        division: Option<&str>,
    ) -> Result<Vec<Stage>, ApiError> {
        let arrived = Utc::now();

        let state = {
            let mut slots = self.slots.lock().await;
            self.sweep_idle(&mut slots, arrived);
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(arrived));
            slot.accessed_at = arrived;
            slot.state.clone()
        };

        let mut guard = state.lock().await;
        self.refresh(key, &mut guard, arrived).await?;

        let entry = match guard.as_ref() {
            Some(entry) => entry,
            None => {
                return Err(ApiError::Data(format!(
                    "no snapshot available for {}",
                    key
                )))
            }
        };
        let summary = EntrySummary::from(entry);
        let stages = match division {
            Some(division) => entry
                .stages
                .iter()
                .map(|s| s.filtered_by_division(division))
                .collect(),
            None => entry.stages.clone(),
        };
        drop(guard);

        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(key) {
            if Arc::ptr_eq(&slot.state, &state) {
                slot.summary = Some(summary);
            }
        }

        Ok(stages)
    }

    async fn refresh(
        &self,
        key: &CompetitionKey,
        entry: &mut Option<SyncEntry>,
        arrived: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        if let Some(existing) = entry.as_mut() {
            if existing.fetched_at > arrived {
                // Another request refreshed this key while we waited on the slot
                debug!(competition = %key, "Snapshot refreshed by concurrent request");
                return Ok(());
            }
            if Utc::now() - existing.fetched_at < self.settings.max_age {
                self.sync_incremental(key, existing).await;
                return Ok(());
            }
        }

        *entry = Some(self.fetch_full(key).await?);
        Ok(())
    }

    async fn fetch_full(&self, key: &CompetitionKey) -> Result<SyncEntry, ApiError> {
        let mut stages = self.call_source(key, None).await?;
        for stage in &mut stages {
            stage.establish_max_score();
        }
        let latest = latest_update(&stages);
        info!(
            competition = %key,
            stages = stages.len(),
            scorecards = scorecard_count(&stages),
            "Full fetch complete"
        );
        Ok(SyncEntry {
            stages,
            latest_update: latest,
            fetched_at: Utc::now(),
        })
    }

    /// Incremental refresh. Failures leave the entry untouched so the
    /// caller is served the stale snapshot.
    async fn sync_incremental(&self, key: &CompetitionKey, entry: &mut SyncEntry) {
        let delta = match self.call_source(key, entry.latest_update).await {
            Ok(delta) => delta,
            Err(e) => {
                warn!(competition = %key, error = %e, "Incremental fetch failed, serving cached snapshot");
                return;
            }
        };

        let changes = merge_stages(&mut entry.stages, delta);
        debug!(competition = %key, changes, "Incremental fetch complete");
        if changes > 0 {
            entry.latest_update = entry.latest_update.max(latest_update(&entry.stages));
        }
        entry.fetched_at = Utc::now();
    }

    async fn call_source(
        &self,
        key: &CompetitionKey,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Stage>, ApiError> {
        let call = self.source.fetch_stages(key, updated_after);
        match tokio::time::timeout(self.settings.fetch_timeout, call).await {
            Ok(result) => result,
            // The dropped future takes any late response with it
            Err(_) => Err(ApiError::Timeout(format!(
                "{} after {}ms",
                key,
                self.settings.fetch_timeout.as_millis()
            ))),
        }
    }

    fn sweep_idle(&self, slots: &mut HashMap<CompetitionKey, Slot>, now: DateTime<Utc>) {
        slots.retain(|key, slot| {
            let keep = now - slot.accessed_at <= self.settings.idle_eviction;
            if !keep {
                debug!(competition = %key, "Evicting idle sync cache entry");
            }
            keep
        });
    }

    /// Remove one entry (both ids) or every entry (neither). Returns the
    /// number of entries removed. The source drops whatever it holds for
    /// the same scope, so the next `get` reaches the provider.
    pub async fn clear(
        &self,
        content_type: Option<&str>,
        competition_id: Option<&str>,
    ) -> Result<usize, ApiError> {
        let removed = match (content_type, competition_id) {
            (Some(content_type), Some(competition_id)) => {
                let key = CompetitionKey::new(content_type, competition_id)?;
                let removed = self.slots.lock().await.remove(&key).map_or(0, |_| 1);
                self.source.invalidate(Some(&key)).await;
                removed
            }
            (None, None) => {
                let removed = {
                    let mut slots = self.slots.lock().await;
                    let removed = slots.len();
                    slots.clear();
                    removed
                };
                self.source.invalidate(None).await;
                removed
            }
            _ => {
                return Err(ApiError::Validation(
                    "content type and competition id must be given together".to_string(),
                ))
            }
        };
        info!(removed, "Sync cache cleared");
        Ok(removed)
    }

    pub async fn stats(&self) -> SyncCacheStats {
        let now = Utc::now();
        let slots = self.slots.lock().await;
        let mut entries: Vec<SyncEntryStats> = slots
            .iter()
            .filter_map(|(key, slot)| {
                slot.summary.map(|summary| SyncEntryStats {
                    key: key.clone(),
                    age_secs: (now - summary.fetched_at).num_seconds(),
                    idle_secs: (now - slot.accessed_at).num_seconds(),
                    scorecard_count: summary.scorecard_count,
                    latest_update: summary.latest_update,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        SyncCacheStats {
            count: entries.len(),
            entries,
        }
    }

    #[cfg(test)]
    async fn backdate(&self, key: &CompetitionKey, fetched_by: Duration, accessed_by: Duration) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(key) {
            slot.accessed_at -= accessed_by;
            if let Some(summary) = slot.summary.as_mut() {
                summary.fetched_at -= fetched_by;
            }
            if let Some(entry) = slot.state.lock().await.as_mut() {
                entry.fetched_at -= fetched_by;
            }
        }
    }

    #[cfg(test)]
    async fn watermark(&self, key: &CompetitionKey) -> Option<DateTime<Utc>> {
        let slots = self.slots.lock().await;
        slots.get(key).and_then(|s| s.summary).and_then(|s| s.latest_update)
    }
}

/// Merge an incremental delta into a snapshot.
///
/// Scorecards are matched by (stage id, scorecard id): a match is replaced,
/// anything new is appended. Nothing is ever removed, so merging the same
/// delta twice gives the same snapshot as merging it once. Returns the
/// number of scorecards in the delta.
pub fn merge_stages(snapshot: &mut Vec<Stage>, delta: Vec<Stage>) -> usize {
    let mut changes = 0;

    for incoming in delta {
        changes += incoming.scorecards.len();

        let Some(stage) = snapshot.iter_mut().find(|s| s.id == incoming.id) else {
            let mut stage = incoming;
            stage.establish_max_score();
            snapshot.push(stage);
            continue;
        };

        for card in incoming.scorecards {
            let card_id = card.scorecard_id();
            match stage
                .scorecards
                .iter_mut()
                .find(|existing| existing.scorecard_id() == card_id)
            {
                Some(existing) => *existing = card,
                None => stage.scorecards.push(card),
            }
        }
        if stage.max_possible_score.is_none() {
            stage.max_possible_score = incoming.max_possible_score;
            stage.establish_max_score();
        }
    }

    changes
}

// ============================================================================
// Tests
// ============================================================================
