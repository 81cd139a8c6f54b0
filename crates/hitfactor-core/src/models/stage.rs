//! Stage and scorecard models in the fixed upstream schema.
//!
//! The upstream adapter produces these directly; the Sync Cache stores them
//! and the Score Engine reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

/// Points per A-zone hit used when deriving a stage maximum from hit counts.
pub const POINTS_PER_TARGET_HIT: f64 = 5.0;

/// How close a reported stage percentage must be to 100 to count as the
/// stage winner's reference row.
const REFERENCE_PERCENT_EPSILON: f64 = 1e-6;

/// Power factor classification. Affects the value of C and D hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerFactor {
    Major,
    #[default]
    Minor,
}

impl PowerFactor {
    /// Per-hit weights as (A, C, D, M, NS).
    pub fn weights(&self) -> (f64, f64, f64, f64, f64) {
        match self {
            PowerFactor::Major => (5.0, 4.0, 2.0, -10.0, -10.0),
            PowerFactor::Minor => (5.0, 3.0, 1.0, -10.0, -10.0),
        }
    }

    /// Lenient parse; anything not recognisably major is scored as minor.
    pub fn parse(s: &str) -> Self {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "major" || lower == "maj" || lower == "+" {
            PowerFactor::Major
        } else {
            PowerFactor::Minor
        }
    }
}

impl From<String> for PowerFactor {
    fn from(s: String) -> Self {
        PowerFactor::parse(&s)
    }
}

impl From<PowerFactor> for String {
    fn from(pf: PowerFactor) -> Self {
        pf.to_string()
    }
}

impl std::fmt::Display for PowerFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerFactor::Major => write!(f, "Major"),
            PowerFactor::Minor => write!(f, "Minor"),
        }
    }
}

/// Raw hit counts. Which upstream fields land in `m` and `ns` is an adapter
/// mapping, hence the aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Hits {
    #[serde(rename = "A", alias = "a", default)]
    pub a: u32,
    #[serde(rename = "C", alias = "c", default)]
    pub c: u32,
    #[serde(rename = "D", alias = "d", default)]
    pub d: u32,
    #[serde(rename = "M", alias = "m", alias = "miss", default)]
    pub m: u32,
    #[serde(rename = "NS", alias = "ns", alias = "noShoot", default)]
    pub ns: u32,
}

impl Hits {
    pub fn new(a: u32, c: u32, d: u32, m: u32, ns: u32) -> Self {
        Self { a, c, d, m, ns }
    }

    /// Number of scoring opportunities represented by these hits.
    /// No-shoots are extra and do not count.
    pub fn target_hits(&self) -> u32 {
        self.a
            .saturating_add(self.c)
            .saturating_add(self.d)
            .saturating_add(self.m)
    }

    /// Weighted score of these hits under a power factor.
    pub fn weighted_score(&self, power_factor: PowerFactor) -> f64 {
        let (wa, wc, wd, wm, wns) = power_factor.weights();
        self.a as f64 * wa
            + self.c as f64 * wc
            + self.d as f64 * wd
            + self.m as f64 * wm
            + self.ns as f64 * wns
    }
}

/// One competitor's result on one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    /// Upstream row id, if the provider exposes one
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "competitorNumber", alias = "number", default)]
    pub number: Option<String>,
    pub name: String,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "powerFactor", default)]
    pub power_factor: PowerFactor,
    #[serde(default)]
    pub hits: Hits,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub points: f64,
    #[serde(rename = "hitFactor", default)]
    pub hit_factor: f64,
    /// Stage points as reported upstream (only meaningful on the winner's row)
    #[serde(rename = "stagePoints", default)]
    pub stage_points: Option<f64>,
    #[serde(rename = "stagePercent", default)]
    pub stage_percent: Option<f64>,
    /// Last modification time upstream; used only for sync bookkeeping
    pub updated: DateTime<Utc>,
}

impl Scorecard {
    /// Identity of the competitor across stages: the competitor number, or
    /// `name|division` when no number is available.
    ///
    /// The fallback can collide for two same-named competitors in one
    /// division. That is a known limitation of the upstream data.
    pub fn competitor_key(&self) -> String {
        match self.number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => number.to_string(),
            _ => format!("{}|{}", self.name.trim(), self.division.trim()),
        }
    }

    /// Identity of this scorecard within its stage, used when merging deltas.
    pub fn scorecard_id(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.competitor_key(),
        }
    }

    pub fn in_category(&self, category: Option<&str>) -> bool {
        match category {
            None => true,
            Some(wanted) => self
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(wanted)),
        }
    }

    pub fn in_division(&self, division: &str) -> bool {
        self.division.eq_ignore_ascii_case(division)
    }

    /// Returns the authoritative stage maximum if this row is the 100% reference.
    fn reference_max_score(&self) -> Option<f64> {
        let percent = self.stage_percent?;
        let points = self.stage_points?;
        if (percent - 100.0).abs() < REFERENCE_PERCENT_EPSILON && points > 0.0 {
            Some(points)
        } else {
            None
        }
    }
}

/// One scored course of fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stable id, distinct from the display number
    pub id: String,
    pub number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "maxPossibleScore", default)]
    pub max_possible_score: Option<f64>,
    #[serde(alias = "competitors", default)]
    pub scorecards: Vec<Scorecard>,
}

impl Stage {
    /// Maximum score this stage would get if established now, without
    /// changing anything. Prefers an authoritative 100% reference row and
    /// falls back to one reference scorecard's hit count. `None` while no
    /// scorecard has any target hits.
    pub fn derive_max_score(&self) -> Option<f64> {
        if let Some(max) = self.max_possible_score {
            return Some(max);
        }
        if let Some(max) = self
            .scorecards
            .iter()
            .find_map(Scorecard::reference_max_score)
        {
            return Some(max);
        }
        // A zeroed row (DNF, DQ) says nothing about the course
        self.scorecards
            .iter()
            .find(|s| s.hits.target_hits() > 0)
            .map(|s| s.hits.target_hits() as f64 * POINTS_PER_TARGET_HIT)
    }

    /// Fix the stage maximum if it has not been established yet.
    /// Once set it is never changed.
    pub fn establish_max_score(&mut self) -> Option<f64> {
        if self.max_possible_score.is_none() {
            self.max_possible_score = self.derive_max_score();
        }
        self.max_possible_score
    }

    pub fn latest_update(&self) -> Option<DateTime<Utc>> {
        self.scorecards.iter().map(|s| s.updated).max()
    }

    pub fn scorecard_for(&self, competitor_key: &str) -> Option<&Scorecard> {
        self.scorecards
            .iter()
            .find(|s| s.competitor_key() == competitor_key)
    }

    pub fn has_competitor(&self, competitor_key: &str) -> bool {
        self.scorecard_for(competitor_key).is_some()
    }

    /// Copy of this stage keeping only scorecards in `division`.
    pub fn filtered_by_division(&self, division: &str) -> Stage {
        Stage {
            id: self.id.clone(),
            number: self.number,
            name: self.name.clone(),
            max_possible_score: self.max_possible_score,
            scorecards: self
                .scorecards
                .iter()
                .filter(|s| s.in_division(division))
                .cloned()
                .collect(),
        }
    }
}

/// Latest `updated` value across a whole snapshot.
pub fn latest_update(stages: &[Stage]) -> Option<DateTime<Utc>> {
    stages.iter().filter_map(Stage::latest_update).max()
}

/// Total number of scorecards across a snapshot.
pub fn scorecard_count(stages: &[Stage]) -> usize {
    stages.iter().map(|s| s.scorecards.len()).sum()
}
