//! Data models for competition scoring.
//!
//! - `CompetitionKey`: the (content type, competition id) identity
//! - `Stage`, `Scorecard`, `Hits`, `PowerFactor`: the fixed upstream schema
//! - `StageScore`, `CompetitorResult`: derived score engine output

pub mod competition;
pub mod result;
pub mod stage;

pub use competition::CompetitionKey;
pub use result::{CompetitorResult, StageScore};
pub use stage::{latest_update, scorecard_count, Hits, PowerFactor, Scorecard, Stage};
