//! Core library for hitfactor.
//!
//! Aggregates practical-shooting match scores from an upstream live-scoring
//! provider and turns them into ranked, comparable results.
//!
//! - [`api`]: upstream adapter (`ScoreSource`, `ScoreboardClient`) and `ApiError`
//! - [`cache`]: `SyncCache` (incremental snapshots) and `ResponseCache` (short TTL)
//! - [`scoring`]: stage normalization, penalty inference, aggregates, comparison
//! - [`service`]: `MatchService`, the request flow tying them together

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod scoring;
pub mod service;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, ScoreSource, ScoreboardClient};
pub use cache::{ResponseCache, SyncCache, SyncSettings};
pub use config::Config;
pub use models::{CompetitionKey, CompetitorResult, Hits, PowerFactor, Scorecard, Stage, StageScore};
pub use scoring::ScoreOptions;
pub use service::MatchService;
