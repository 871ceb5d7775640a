//! # tether-search
//!
//! Hybrid search for tether: weighted Reciprocal Rank Fusion over a
//! keyword and a vector ranking, an epoch-guarded result cache, and the
//! orchestration engine tying them together.

pub mod cache;
pub mod hybrid;
pub mod rrf;

pub use cache::{normalize_query, CacheStats, Clock, ResultCache, SystemClock};
pub use hybrid::{clamp_limit, HybridSearchEngine, SearchOptions};
pub use rrf::{rrf_fuse, rrf_fuse_with_k, FusedHit};
