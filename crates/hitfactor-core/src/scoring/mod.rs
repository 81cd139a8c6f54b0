//! Score engine.
//!
//! Turns raw stage telemetry into comparable results:
//!
//! 1. Stage maximum: authoritative reference row, else `(A+C+D+M) * 5`
//! 2. Pool max hit factor, scoped to the active category
//! 3. Stage score = `hit_factor / pool_max * stage_max`
//! 4. Penalties inferred from the gap between hit value and reported points
//! 5. Totals, ranked descending (ties keep roster order)
//!
//! Comparison mode restricts to stages every requested competitor shot;
//! stage exclusion is applied first in both modes.

pub mod engine;
pub mod penalty;

pub use engine::{
    compare_competitors, comparison_stages, competitor_keys, compute_scores, pool_max_hit_factor,
    score_stage, stage_max_score, stage_score, ScoreOptions,
};
pub use penalty::{infer_penalties, PENALTY_POINTS};
