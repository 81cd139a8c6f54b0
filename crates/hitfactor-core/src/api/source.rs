use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CompetitionKey, Stage};

use super::ApiError;

/// Upstream live-scoring provider.
///
/// `updated_after == None` is a full fetch of every stage and scorecard.
/// `Some(ts)` is an incremental fetch: only scorecards whose `updated` is
/// strictly later than `ts`, grouped under their stages.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn fetch_stages(
        &self,
        key: &CompetitionKey,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Stage>, ApiError>;

    /// Drop anything the source keeps for `key` (every key when `None`), so
    /// the next full fetch goes to the provider.
    async fn invalidate(&self, _key: Option<&CompetitionKey>) {}
}
