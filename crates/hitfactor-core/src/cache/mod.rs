//! In-memory caching module.
//!
//! Two tiers with deliberately different time scales:
//!
//! - `SyncCache` holds one full snapshot per competition for days and keeps
//!   it fresh with incremental fetches. It absorbs upstream load.
//! - `ResponseCache` memoizes computed stage lists for a few seconds. It
//!   absorbs bursts of identical client polls.
//!
//! Nothing is persisted; a restart starts cold.

pub mod response;
pub mod sync;

pub use response::{response_key, ResponseCache, ResponseCacheStats, SharedStages};
pub use sync::{merge_stages, SyncCache, SyncCacheStats, SyncEntryStats, SyncSettings};
