//! Request flow: Response Cache, then Sync Cache, then Score Engine.
//!
//! `MatchService` owns one instance of each cache. Several services can
//! coexist (one per test, one per upstream); there is no global state.

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::api::{ApiError, ScoreSource, ScoreboardClient};
use crate::cache::{
    response_key, ResponseCache, ResponseCacheStats, SharedStages, SyncCache, SyncCacheStats,
    SyncSettings,
};
use crate::config::Config;
use crate::models::{CompetitionKey, CompetitorResult, StageScore};
use crate::scoring::{self, ScoreOptions};

pub struct MatchService {
    sync: SyncCache,
    responses: ResponseCache,
}

fn normalize_division(division: Option<&str>) -> Option<&str> {
    division.map(str::trim).filter(|d| !d.is_empty())
}

impl MatchService {
    pub fn new(source: Arc<dyn ScoreSource>, sync_settings: SyncSettings, response_ttl: Duration) -> Self {
        Self {
            sync: SyncCache::new(source, sync_settings),
            responses: ResponseCache::new(response_ttl),
        }
    }

    /// Build the HTTP upstream client and both caches from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let client = ScoreboardClient::new(config.client_settings())?;
        Ok(Self::new(
            Arc::new(client),
            config.sync_settings(),
            config.response_ttl(),
        ))
    }

    /// Stage list for a competition with every stage maximum established,
    /// ordered by stage number. Identical requests within the response TTL
    /// share one stored list.
    pub async fn stages(
        &self,
        content_type: &str,
        competition_id: &str,
        division: Option<&str>,
    ) -> Result<SharedStages, ApiError> {
        let key = CompetitionKey::new(content_type, competition_id)?;
        let division = normalize_division(division);
        let cache_key = response_key(&key, division);

        let sync = &self.sync;
        let key = &key;
        self.responses
            .get_or_try_insert_with(&cache_key, move || async move {
                debug!(competition = %key, "Response cache miss");
                let mut stages = sync.get(key, division).await?;
                for stage in &mut stages {
                    stage.establish_max_score();
                }
                stages.sort_by_key(|s| s.number);
                Ok(stages)
            })
            .await
    }

    pub async fn compute_scores(
        &self,
        content_type: &str,
        competition_id: &str,
        division: Option<&str>,
        options: &ScoreOptions,
    ) -> Result<Vec<CompetitorResult>, ApiError> {
        let stages = self.stages(content_type, competition_id, division).await?;
        Ok(scoring::compute_scores(&stages, options))
    }

    pub async fn compare_competitors<S: AsRef<str>>(
        &self,
        content_type: &str,
        competition_id: &str,
        division: Option<&str>,
        keys: &[S],
        options: &ScoreOptions,
    ) -> Result<Vec<CompetitorResult>, ApiError> {
        let stages = self.stages(content_type, competition_id, division).await?;
        scoring::compare_competitors(&stages, keys, options)
    }

    /// Scores on one stage, best first.
    pub async fn stage_results(
        &self,
        content_type: &str,
        competition_id: &str,
        division: Option<&str>,
        stage_number: u32,
        category: Option<&str>,
    ) -> Result<Vec<StageScore>, ApiError> {
        let stages = self.stages(content_type, competition_id, division).await?;
        let stage = stages
            .iter()
            .find(|s| s.number == stage_number)
            .ok_or_else(|| ApiError::Validation(format!("no stage {}", stage_number)))?;
        Ok(scoring::score_stage(stage, category))
    }

    /// Drop one competition (both ids) or everything (neither) from the
    /// sync cache and the upstream client's raw bodies. Computed responses
    /// are dropped too so the next request sees the refetched data.
    pub async fn clear_sync_cache(
        &self,
        content_type: Option<&str>,
        competition_id: Option<&str>,
    ) -> Result<usize, ApiError> {
        let removed = self.sync.clear(content_type, competition_id).await?;
        self.responses.clear().await;
        Ok(removed)
    }

    pub async fn sync_cache_stats(&self) -> SyncCacheStats {
        self.sync.stats().await
    }

    pub async fn response_cache_stats(&self) -> ResponseCacheStats {
        self.responses.stats().await
    }
}
