//! Core traits for tether's external collaborators.
//!
//! These traits define the seams between the orchestration core and the
//! storage, ranking, embedding, and fetching backends, enabling pluggable
//! implementations and in-memory fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{FetchError, Result};
use crate::models::*;

// =============================================================================
// LINK STORE
// =============================================================================

/// Transactional store for links, keyed by unique normalized URL.
///
/// Per-link updates are atomic; the scheduler relies on that and implements
/// no locking of its own.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert a new link. Fails if the normalized URL already exists.
    async fn add(&self, req: CreateLinkRequest) -> Result<Uuid>;

    /// Fetch a full link by id.
    async fn get_by_id(&self, id: Uuid) -> Result<Link>;

    /// Fetch a full link by normalized URL.
    async fn get_by_url(&self, url: &str) -> Result<Option<Link>>;

    /// List links ordered by last update, newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<LinkSummary>>;

    /// Update user-editable metadata. Bumps `updated_at`.
    async fn update_metadata(&self, id: Uuid, req: UpdateLinkMetadataRequest) -> Result<()>;

    /// Record the outcome of a crawl attempt in one atomic update:
    /// content fields, `crawled_at`, `http_status`, and `crawl_error`
    /// (null on success). Clears the stored embedding when the extracted
    /// text changed.
    ///
    /// Returns whether the stored content changed.
    async fn update_crawl_result(
        &self,
        id: Uuid,
        content: CrawlContent,
        http_status: Option<i32>,
        crawl_error: Option<String>,
        crawled_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Set the hidden flag. Hidden links leave every ranking path and the
    /// crawl candidate pool.
    async fn set_hidden(&self, id: Uuid, hidden: bool) -> Result<()>;

    /// Remove a link permanently.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Resolve a crawl policy into candidate link ids. Hidden links are
    /// excluded for every policy except an explicit `Url` target.
    async fn list_candidates(&self, policy: &CrawlPolicy) -> Result<Vec<Uuid>>;

    /// Fetch summaries for a set of ids, for hydrating search results.
    /// Ids with no backing row are silently dropped.
    async fn fetch_summaries(&self, ids: &[Uuid]) -> Result<Vec<LinkSummary>>;

    /// Store a (re)generated embedding for a link.
    async fn store_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()>;

    /// Ids of non-hidden links with searchable text but no embedding yet.
    async fn ids_missing_embedding(&self, limit: i64) -> Result<Vec<Uuid>>;
}

// =============================================================================
// RANKERS
// =============================================================================

/// Query input for a [`Ranker`], by modality.
#[derive(Debug, Clone, Copy)]
pub enum RankQuery<'a> {
    /// Keyword query text.
    Text(&'a str),
    /// Pre-computed query embedding.
    Embedding(&'a [f32]),
}

/// A ranked retrieval source: keyword (BM25) or vector (nearest-neighbor).
///
/// One shared interface so fusion logic stays agnostic to the concrete
/// backend. Implementations must exclude hidden links and error pages;
/// the orchestrator does not re-filter.
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Return the top-`k` hits for `query`, best first.
    async fn rank(&self, query: RankQuery<'_>, k: usize) -> Result<Vec<RankedHit>>;
}

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// Maps text to a fixed-length vector. May fail or rate-limit; callers
/// degrade the vector path rather than surfacing the failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimension this provider produces.
    fn dimension(&self) -> usize;
}

// =============================================================================
// CONTENT FETCHER
// =============================================================================

/// Fetches raw HTML for a URL. Failures are classified transient or
/// permanent so the scheduler can apply its retry policy.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<FetchedPage, FetchError>;
}
