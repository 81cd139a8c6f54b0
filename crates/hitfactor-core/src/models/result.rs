//! Derived results produced by the score engine. Never stored upstream.

use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

use super::{Hits, PowerFactor};

/// A competitor's normalized score on a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct StageScore {
    pub stage_id: String,
    pub stage_number: u32,
    pub competitor_key: String,
    pub score: f64,
    pub penalties: u32,
    pub hits: Hits,
    pub time: f64,
    pub points: f64,
    pub hit_factor: f64,
}

/// Aggregate result for one competitor across the included stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct CompetitorResult {
    pub rank: usize,
    pub competitor_key: String,
    pub name: String,
    pub division: String,
    pub category: Option<String>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub power_factor: PowerFactor,
    pub total_score: f64,
    pub total_penalties: u32,
    /// One entry per included stage the competitor shot
    pub stages: Vec<StageScore>,
}

impl CompetitorResult {
    pub fn stage_score(&self, stage_id: &str) -> Option<&StageScore> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    pub fn stages_shot(&self) -> usize {
        self.stages.len()
    }
}
