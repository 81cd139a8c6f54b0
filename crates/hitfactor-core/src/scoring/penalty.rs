use crate::models::{Hits, PowerFactor};

/// Points deducted per procedural penalty.
pub const PENALTY_POINTS: f64 = 10.0;

/// Absorbs float noise in reported points (e.g. 119.99999 for 120).
const POINT_EPSILON: f64 = 1e-6;

/// Estimate procedural penalties from the gap between what the hits are
/// worth and the points actually reported.
///
/// Any unexplained loss is attributed to 10-point penalties. This is an
/// approximation of the provider's own accounting, not a replacement for it.
pub fn infer_penalties(hits: &Hits, power_factor: PowerFactor, reported_points: f64) -> u32 {
    let gap = hits.weighted_score(power_factor) - reported_points;
    if gap <= 0.0 {
        return 0;
    }
    ((gap + POINT_EPSILON) / PENALTY_POINTS).floor() as u32
}
