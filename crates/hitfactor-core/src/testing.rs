//! In-memory `ScoreSource` for cache and service tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::{ApiError, ScoreSource};
use crate::models::{CompetitionKey, Stage};

type Scripted = Result<Vec<Stage>, ApiError>;

/// Replays queued responses and records every call's watermark and every
/// invalidation.
/// An empty full-fetch queue fails; an empty incremental queue reports
/// no changes.
#[derive(Default)]
pub struct ScriptedSource {
    full: Mutex<VecDeque<Scripted>>,
    incremental: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Option<DateTime<Utc>>>>,
    invalidations: Mutex<Vec<Option<CompetitionKey>>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_full(&self, response: Scripted) {
        self.full.lock().unwrap().push_back(response);
    }

    pub fn push_incremental(&self, response: Scripted) {
        self.incremental.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn invalidations(&self) -> Vec<Option<CompetitionKey>> {
        self.invalidations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScoreSource for ScriptedSource {
    async fn fetch_stages(
        &self,
        key: &CompetitionKey,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Stage>, ApiError> {
        self.calls.lock().unwrap().push(updated_after);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match updated_after {
            None => self.full.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(ApiError::Fetch {
                    status: None,
                    message: format!("no scripted response for {}", key),
                })
            }),
            Some(_) => self
                .incremental
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new())),
        }
    }

    async fn invalidate(&self, key: Option<&CompetitionKey>) {
        self.invalidations.lock().unwrap().push(key.cloned());
    }
}
