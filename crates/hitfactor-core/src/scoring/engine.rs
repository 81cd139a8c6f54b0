//! Stage normalization and aggregate ranking.
//!
//! Every function here is pure: results are recomputed from the stage list
//! on each call and nothing is cached.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::api::ApiError;
use crate::models::{CompetitorResult, Scorecard, Stage, StageScore};

use super::penalty::infer_penalties;

/// Slicing applied before scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreOptions {
    /// Restrict the comparison pool (and roster) to one category
    pub category: Option<String>,
    /// Stage numbers dropped before any aggregate math
    pub excluded_stages: BTreeSet<u32>,
}

impl ScoreOptions {
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn excluding<I: IntoIterator<Item = u32>>(mut self, stages: I) -> Self {
        self.excluded_stages.extend(stages);
        self
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Maximum achievable score on a stage, or `None` when nobody shot it or
/// no scorecard has any target hits yet.
pub fn stage_max_score(stage: &Stage) -> Option<f64> {
    if stage.scorecards.is_empty() {
        return None;
    }
    stage.derive_max_score()
}

/// Best hit factor among competitors in `category` (all when `None`).
/// Zero when nobody in the pool has a positive hit factor.
pub fn pool_max_hit_factor(stage: &Stage, category: Option<&str>) -> f64 {
    stage
        .scorecards
        .iter()
        .filter(|s| s.in_category(category))
        .map(|s| s.hit_factor)
        .fold(0.0, f64::max)
}

/// Ratio-to-best stage score, capped at the stage maximum.
pub fn stage_score(hit_factor: f64, pool_max_hit_factor: f64, stage_max_score: f64) -> f64 {
    if pool_max_hit_factor <= 0.0 {
        return 0.0;
    }
    (hit_factor.max(0.0) / pool_max_hit_factor * stage_max_score).min(stage_max_score)
}

fn score_card(stage: &Stage, card: &Scorecard, pool_max: f64, stage_max: f64) -> StageScore {
    StageScore {
        stage_id: stage.id.clone(),
        stage_number: stage.number,
        competitor_key: card.competitor_key(),
        score: stage_score(card.hit_factor, pool_max, stage_max),
        penalties: infer_penalties(&card.hits, card.power_factor, card.points),
        hits: card.hits,
        time: card.time,
        points: card.points,
        hit_factor: card.hit_factor,
    }
}

/// Scores for every scorecard on the stage, keyed by competitor. The pool
/// maximum comes from `category` only. `None` when the stage has no max.
fn stage_scores_by_key(stage: &Stage, category: Option<&str>) -> Option<HashMap<String, StageScore>> {
    let stage_max = stage_max_score(stage)?;
    let pool_max = pool_max_hit_factor(stage, category);

    let mut scores = HashMap::with_capacity(stage.scorecards.len());
    for card in &stage.scorecards {
        scores
            .entry(card.competitor_key())
            .or_insert_with(|| score_card(stage, card, pool_max, stage_max));
    }
    Some(scores)
}

/// Per-stage view: one score per competitor in `category`, best first.
pub fn score_stage(stage: &Stage, category: Option<&str>) -> Vec<StageScore> {
    let Some(stage_max) = stage_max_score(stage) else {
        return Vec::new();
    };
    let pool_max = pool_max_hit_factor(stage, category);

    let mut scores: Vec<StageScore> = stage
        .scorecards
        .iter()
        .filter(|s| s.in_category(category))
        .map(|card| score_card(stage, card, pool_max, stage_max))
        .collect();
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scores
}

fn included_stages<'a>(stages: &'a [Stage], options: &ScoreOptions) -> Vec<&'a Stage> {
    stages
        .iter()
        .filter(|s| !options.excluded_stages.contains(&s.number))
        .collect()
}

/// Competitor keys in first-appearance order, restricted to `category`.
pub fn competitor_keys(stages: &[Stage], category: Option<&str>) -> Vec<String> {
    let refs: Vec<&Stage> = stages.iter().collect();
    roster(&refs, category)
        .into_iter()
        .map(|card| card.competitor_key())
        .collect()
}

/// First scorecard of each distinct competitor, in order of appearance.
fn roster<'a>(stages: &[&'a Stage], category: Option<&str>) -> Vec<&'a Scorecard> {
    let mut seen = HashSet::new();
    stages
        .iter()
        .copied()
        .flat_map(|stage| stage.scorecards.iter())
        .filter(|card| card.in_category(category))
        .filter(|card| seen.insert(card.competitor_key()))
        .collect()
}

/// Stages on which every requested competitor has a scorecard.
pub fn comparison_stages<'a, S: AsRef<str>>(stages: &'a [Stage], keys: &[S]) -> Vec<&'a Stage> {
    stages
        .iter()
        .filter(|stage| keys.iter().all(|k| stage.has_competitor(k.as_ref())))
        .collect()
}

fn aggregate(stages: &[&Stage], roster: Vec<&Scorecard>, category: Option<&str>) -> Vec<CompetitorResult> {
    let per_stage: Vec<HashMap<String, StageScore>> = stages
        .iter()
        .filter_map(|stage| stage_scores_by_key(stage, category))
        .collect();

    let mut results: Vec<CompetitorResult> = roster
        .into_iter()
        .map(|card| {
            let key = card.competitor_key();
            let shot: Vec<StageScore> = per_stage
                .iter()
                .filter_map(|scores| scores.get(&key).cloned())
                .collect();
            CompetitorResult {
                rank: 0,
                name: card.name.clone(),
                division: card.division.clone(),
                category: card.category.clone(),
                power_factor: card.power_factor,
                total_score: shot.iter().map(|s| s.score).sum(),
                total_penalties: shot.iter().map(|s| s.penalties).sum(),
                stages: shot,
                competitor_key: key,
            }
        })
        .collect();

    // Stable: ties keep roster order
    results.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
    });
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
    results
}

/// Rank every competitor (in the category, if set) by total stage score.
pub fn compute_scores(stages: &[Stage], options: &ScoreOptions) -> Vec<CompetitorResult> {
    let included = included_stages(stages, options);
    let roster = roster(&included, options.category());
    aggregate(&included, roster, options.category())
}

/// Rank only the requested competitors, over the stages they all shot.
///
/// A key that appears on no stage at all (for example, filtered out by a
/// division projection) is a `Validation` error, since there is no
/// scorecard to name the result row from. Keys that are all present but
/// never shot a common stage give rows with no stages and a total of 0.
pub fn compare_competitors<S: AsRef<str>>(
    stages: &[Stage],
    keys: &[S],
    options: &ScoreOptions,
) -> Result<Vec<CompetitorResult>, ApiError> {
    let mut requested: Vec<&str> = Vec::with_capacity(keys.len());
    for key in keys.iter().map(|k| k.as_ref().trim()) {
        if key.is_empty() {
            return Err(ApiError::Validation("empty competitor key".to_string()));
        }
        if !requested.contains(&key) {
            requested.push(key);
        }
    }
    if requested.is_empty() {
        return Err(ApiError::Validation(
            "at least one competitor key is required".to_string(),
        ));
    }

    let mut cards = Vec::with_capacity(requested.len());
    for key in &requested {
        let card = stages
            .iter()
            .find_map(|stage| stage.scorecard_for(key))
            .ok_or_else(|| ApiError::Validation(format!("unknown competitor: {}", key)))?;
        cards.push(card);
    }

    let included = included_stages(stages, options);
    let shared: Vec<&Stage> = included
        .into_iter()
        .filter(|stage| requested.iter().all(|k| stage.has_competitor(k)))
        .collect();

    Ok(aggregate(&shared, cards, options.category()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stage::fixtures::{card, stage};
    use crate::models::Hits;

    const EPS: f64 = 1e-9;

    fn profile() -> Hits {
        Hits::new(27, 3, 0, 0, 0)
    }

    fn in_category(mut c: Scorecard, category: &str) -> Scorecard {
        c.category = Some(category.to_string());
        c
    }

    /// Three stages: "1" shoots all, "2" shoots 1 and 2, "3" shoots 2 and 3.
    fn match_stages() -> Vec<Stage> {
        vec![
            stage(
                "s1",
                1,
                vec![
                    card("1", profile(), 5.0),
                    in_category(card("2", profile(), 4.0), "Senior"),
                    in_category(card("3", profile(), 2.0), "Senior"),
                ],
            ),
            stage(
                "s2",
                2,
                vec![card("1", profile(), 3.0), in_category(card("2", profile(), 6.0), "Senior")],
            ),
            stage(
                "s3",
                3,
                vec![card("1", profile(), 4.0), in_category(card("3", profile(), 4.0), "Senior")],
            ),
        ]
    }

    // -------------------------------------------------------------------------
    // Per-stage math
    // -------------------------------------------------------------------------

    #[test]
    fn test_worked_example() {
        let s = stage(
            "s1",
            1,
            vec![card("X", profile(), 4.07), card("Y", profile(), 2.0)],
        );
        assert_eq!(stage_max_score(&s), Some(150.0));

        let scores = score_stage(&s, None);
        assert!((scores[0].score - 150.0).abs() < EPS);
        assert!((scores[1].score - 2.0 / 4.07 * 150.0).abs() < EPS);
        assert!((scores[1].score - 73.71).abs() < 0.01);
    }

    #[test]
    fn test_pool_best_reaches_max_within_category() {
        let stages = match_stages();
        let senior = score_stage(&stages[0], Some("senior"));
        assert_eq!(senior.len(), 2);
        assert_eq!(senior[0].competitor_key, "2");
        assert!((senior[0].score - 150.0).abs() < EPS);
        assert!((senior[1].score - 75.0).abs() < EPS);
    }

    #[test]
    fn test_zero_pool_forces_zero_scores() {
        let s = stage(
            "s1",
            1,
            vec![card("1", profile(), 0.0), card("2", Hits::new(0, 0, 0, 5, 0), 0.0)],
        );
        assert_eq!(pool_max_hit_factor(&s, None), 0.0);
        assert!(score_stage(&s, None).iter().all(|s| s.score == 0.0));
        assert_eq!(stage_score(3.0, 0.0, 150.0), 0.0);
    }

    #[test]
    fn test_empty_stage_has_no_max() {
        let mut s = stage("s1", 1, vec![]);
        s.max_possible_score = Some(100.0);
        assert_eq!(stage_max_score(&s), None);
        assert!(score_stage(&s, None).is_empty());
    }

    #[test]
    fn test_score_never_exceeds_max() {
        assert_eq!(stage_score(8.0, 4.0, 150.0), 150.0);
        assert_eq!(stage_score(-1.0, 4.0, 150.0), 0.0);
    }

    #[test]
    fn test_stage_score_echoes_raw_values_and_penalties() {
        let mut c = card("1", Hits::new(28, 0, 0, 0, 0), 5.0);
        c.points = 120.0;
        c.time = 24.0;
        let s = stage("s1", 1, vec![c]);
        let scores = score_stage(&s, None);
        assert_eq!(scores[0].penalties, 2);
        assert_eq!(scores[0].time, 24.0);
        assert_eq!(scores[0].points, 120.0);
        assert_eq!(scores[0].hits, Hits::new(28, 0, 0, 0, 0));
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    #[test]
    fn test_compute_scores_totals_and_ranking() {
        let results = compute_scores(&match_stages(), &ScoreOptions::default());
        let keys: Vec<&str> = results.iter().map(|r| r.competitor_key.as_str()).collect();
        // 1: 150 + 75 + 150 = 375, 2: 120 + 150 = 270, 3: 60 + 150 = 210
        assert_eq!(keys, vec!["1", "2", "3"]);
        assert!((results[0].total_score - 375.0).abs() < EPS);
        assert!((results[1].total_score - 270.0).abs() < EPS);
        assert!((results[2].total_score - 210.0).abs() < EPS);
        assert_eq!(results[1].stages_shot(), 2);
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_category_filter_rescales_pool() {
        let options = ScoreOptions::default().with_category("Senior");
        let results = compute_scores(&match_stages(), &options);
        assert_eq!(results.len(), 2);
        // 2: 150 + 150 = 300, 3: 75 + 150 = 225
        assert_eq!(results[0].competitor_key, "2");
        assert!((results[0].total_score - 300.0).abs() < EPS);
        assert!((results[1].total_score - 225.0).abs() < EPS);
    }

    #[test]
    fn test_excluded_stages_are_dropped() {
        let options = ScoreOptions::default().excluding([1, 3]);
        let results = compute_scores(&match_stages(), &options);
        // Only stage 2: 2 = 150, 1 = 75; 3 did not shoot it
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].competitor_key, "2");
        assert!(results[0].stage_score("s1").is_none());
    }

    #[test]
    fn test_ties_keep_roster_order() {
        let s = stage(
            "s1",
            1,
            vec![card("b", profile(), 3.0), card("a", profile(), 3.0)],
        );
        let results = compute_scores(&[s], &ScoreOptions::default());
        assert_eq!(results[0].competitor_key, "b");
        assert_eq!(results[1].competitor_key, "a");
    }

    #[test]
    fn test_competitor_keys_first_appearance() {
        let stages = match_stages();
        assert_eq!(competitor_keys(&stages, None), vec!["1", "2", "3"]);
        assert_eq!(competitor_keys(&stages, Some("senior")), vec!["2", "3"]);
    }

    // -------------------------------------------------------------------------
    // Comparison
    // -------------------------------------------------------------------------

    #[test]
    fn test_comparison_uses_shared_stages_only() {
        let stages = match_stages();
        let shared = comparison_stages(&stages, &["1", "2"]);
        assert_eq!(shared.iter().map(|s| s.number).collect::<Vec<_>>(), vec![1, 2]);

        let results = compare_competitors(&stages, &["1", "2"], &ScoreOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        // 1: 150 + 75 = 225, 2: 120 + 150 = 270
        assert_eq!(results[0].competitor_key, "2");
        assert!((results[0].total_score - 270.0).abs() < EPS);
        assert!((results[1].total_score - 225.0).abs() < EPS);
    }

    #[test]
    fn test_disjoint_participation_collapses_to_empty() {
        let mut stages = match_stages();
        stages[0].scorecards.retain(|c| c.competitor_key() != "3");
        assert!(comparison_stages(&stages, &["2", "3"]).is_empty());

        let results = compare_competitors(&stages, &["2", "3"], &ScoreOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.total_score == 0.0 && r.stages.is_empty()));
    }

    #[test]
    fn test_comparison_respects_exclusions() {
        let options = ScoreOptions::default().excluding([2]);
        let results = compare_competitors(&match_stages(), &["1", "2"], &options).unwrap();
        assert!(results.iter().all(|r| r.stages_shot() == 1));
    }

    #[test]
    fn test_comparison_pool_is_not_the_requested_keys() {
        // 1 is the stage 1 winner but not compared; 3 still scores 60, not 150
        let results = compare_competitors(&match_stages(), &["3"], &ScoreOptions::default()).unwrap();
        assert_eq!(results[0].stages.len(), 2);
        assert!((results[0].stages[0].score - 60.0).abs() < EPS);
    }

    #[test]
    fn test_comparison_validation() {
        let stages = match_stages();
        let none: [&str; 0] = [];
        assert!(matches!(
            compare_competitors(&stages, &none, &ScoreOptions::default()),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            compare_competitors(&stages, &["1", "404"], &ScoreOptions::default()),
            Err(ApiError::Validation(_))
        ));
        let deduped = compare_competitors(&stages, &["1", "1 "], &ScoreOptions::default()).unwrap();
        assert_eq!(deduped.len(), 1);
    }
}
