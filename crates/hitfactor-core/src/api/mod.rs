//! Upstream adapter module.
//!
//! `ScoreSource` is the seam between the caches and the live-scoring
//! provider. `ScoreboardClient` is the HTTP implementation; it keeps a
//! bounded `RawResponseCache` of recent full-fetch bodies.
//!
//! All failures are reported as `ApiError`.

pub mod client;
pub mod error;
pub mod raw_cache;
pub mod source;

pub use client::{ClientSettings, ScoreboardClient};
pub use error::ApiError;
pub use raw_cache::RawResponseCache;
pub use source::ScoreSource;
