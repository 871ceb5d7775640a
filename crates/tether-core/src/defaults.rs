//! Default configuration values for tether.
//!
//! Components read these through their `Config::default()` / `from_env()`
//! constructors; environment overrides use `TETHER_*` variables.

// ─── Search / fusion ───────────────────────────────────────────────────────

/// RRF smoothing constant. Fixed design parameter, not user-configurable;
/// overridable only through the `_with_k` test entry point.
///
/// Reference: Cormack et al. (2009).
pub const RRF_K: f32 = 60.0;

/// Hard ceiling on a single page of search results. Requested limits above
/// this are clamped, not rejected.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Depth the fused ranking is always computed and cached to, so one cache
/// entry serves every page of the same query. Also the floor that keeps
/// shallow requests from starving the fused tail.
pub const FUSION_DEPTH: usize = 100;

/// Maximum cosine distance for a vector hit to enter fusion.
pub const MAX_VECTOR_DISTANCE: f32 = 0.8;

// ─── Result cache ──────────────────────────────────────────────────────────

/// Cache TTL in seconds (1 hour). Env: `TETHER_CACHE_TTL`.
pub const CACHE_TTL_SECS: u64 = 3600;

/// Cache key prefix.
pub const CACHE_KEY_PREFIX: &str = "tether:search:";

// ─── Crawl scheduler ───────────────────────────────────────────────────────

/// Maximum simultaneous fetches in one crawl cycle.
/// Env: `TETHER_CRAWL_MAX_CONCURRENT`.
pub const CRAWL_MAX_CONCURRENT: usize = 4;

/// Per-attempt fetch timeout in seconds. Env: `TETHER_FETCH_TIMEOUT_SECS`.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Fetch attempts per link before recording FAILED.
/// Env: `TETHER_CRAWL_MAX_ATTEMPTS`.
pub const CRAWL_MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential retry backoff, in milliseconds.
/// Env: `TETHER_CRAWL_BACKOFF_BASE_MS`.
pub const CRAWL_BACKOFF_BASE_MS: u64 = 500;

/// Extracted body text is truncated to this many characters.
pub const CONTENT_MAX_CHARS: usize = 50_000;

/// User agent sent with crawl fetches.
pub const CRAWL_USER_AGENT: &str = "Mozilla/5.0 (compatible; tether/0.3; +https://github.com/tether-dev/tether)";

// ─── Embeddings ────────────────────────────────────────────────────────────

/// Default Ollama endpoint. Env: `TETHER_OLLAMA_URL`.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model. Env: `TETHER_EMBED_MODEL`.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Embedding dimension for the default model. Env: `TETHER_EMBED_DIM`.
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for embedding requests (seconds). Env: `TETHER_EMBED_TIMEOUT_SECS`.
pub const EMBED_TIMEOUT_SECS: u64 = 60;

/// Embedding input is truncated to this many characters.
pub const EMBED_MAX_CHARS: usize = 30_000;
