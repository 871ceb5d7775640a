//! Structured logging schema and field name constants for tether.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, cycle completions |
//! | DEBUG | Decision points, cache hits/misses, config choices |
//! | TRACE | Per-item iteration (individual hits, fetch attempts) |

use tracing_subscriber::EnvFilter;

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "search", "cache", "crawl", "db", "inference"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "hybrid", "rrf", "result_cache", "scheduler", "fetcher"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "run_cycle", "fetch", "embed"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Link UUID being operated on.
pub const LINK_ID: &str = "link_id";

/// Target URL of a fetch or store operation.
pub const URL: &str = "url";

/// Search query text (normalized).
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of keyword hits before fusion.
pub const KEYWORD_HITS: &str = "keyword_hits";

/// Number of vector hits before fusion.
pub const VECTOR_HITS: &str = "vector_hits";

/// Keyword weight used in hybrid search.
pub const KEYWORD_WEIGHT: &str = "keyword_weight";

/// Vector weight used in hybrid search.
pub const VECTOR_WEIGHT: &str = "vector_weight";

// ─── Crawl fields ──────────────────────────────────────────────────────────

/// HTTP status of the last fetch attempt.
pub const HTTP_STATUS: &str = "http_status";

/// 1-based fetch attempt number.
pub const ATTEMPT: &str = "attempt";

/// Candidate selection policy for a cycle.
pub const POLICY: &str = "policy";

// ─── Cache fields ──────────────────────────────────────────────────────────

/// Cache epoch at computation or invalidation time.
pub const CACHE_EPOCH: &str = "cache_epoch";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Initialize the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `info`). Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
