//! Core data model for tether: links, search results, crawl outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A crawlable bookmarked resource.
///
/// Identity is the opaque `id`; uniqueness is enforced on the normalized
/// `url` by the store. Content fields stay empty until the link is crawled
/// or annotated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Extracted body text from the last successful crawl.
    pub content: Option<String>,
    /// Free-form user annotations.
    pub notes: Option<String>,
    pub tags: Vec<String>,
    /// Hidden links are excluded from every ranking path and from crawl
    /// candidate selection.
    pub hidden: bool,
    /// Immutable, set at creation.
    pub added_at: DateTime<Utc>,
    /// Bumped on any metadata write.
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the most recent crawl *attempt*; null until the first one.
    pub crawled_at: Option<DateTime<Utc>>,
    pub http_status: Option<i32>,
    /// Null after a successful crawl.
    pub crawl_error: Option<String>,
    /// Whether an embedding exists for this link. Absence excludes the link
    /// from vector ranking.
    pub has_embedding: bool,
}

/// Lightweight projection of a [`Link`] used to hydrate search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSummary {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Request for creating a new link.
#[derive(Debug, Clone)]
pub struct CreateLinkRequest {
    pub url: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

impl CreateLinkRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            notes: None,
            tags: Vec::new(),
        }
    }
}

/// Metadata fields updatable without a crawl. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateLinkMetadataRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Content fields produced by a successful fetch-and-extract, written back
/// to the store in one atomic update.
#[derive(Debug, Clone, Default)]
pub struct CrawlContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    /// SHA-256 of `content`, precomputed at extraction. The store compares
    /// it against the digest of the stored text to decide `content_changed`;
    /// when absent it is derived from `content`.
    pub content_digest: Option<String>,
}

/// Hex SHA-256 of a content text, the unit of change detection.
pub fn content_digest(text: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Candidate selection policy for a crawl cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "arg")]
pub enum CrawlPolicy {
    /// Every non-hidden link.
    All,
    /// Links never successfully crawled (crawled_at is null).
    Missing,
    /// Links whose last crawl is older than `days` days, or never crawled.
    Stale { days: i64 },
    /// A single explicit target, crawled even if hidden.
    Url(String),
}

/// Raw result of fetching one URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub http_status: u16,
    pub elapsed_ms: u64,
}

/// Per-attempt record for one link in a crawl cycle. Transient: feeds the
/// cycle summary and the invalidation decision, not persisted.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub link_id: Uuid,
    pub url: String,
    pub success: bool,
    pub http_status: Option<u16>,
    pub error: Option<String>,
    /// Whether the extracted text differed from the previously stored text.
    pub content_changed: bool,
    /// Total fetch attempts made, including the final one.
    pub attempts: u32,
    pub elapsed_ms: u64,
}

/// Result of a link-discovery pass over a single page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverySummary {
    /// Same-site anchors found on the page, before the budget cut.
    pub discovered: usize,
    /// New links added to the store.
    pub added: usize,
    /// Candidates the store already had.
    pub skipped_existing: usize,
    pub elapsed_ms: u64,
}

/// Aggregated result of one crawl cycle. Returned to the caller, never cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    pub done: usize,
    pub failed: usize,
    /// Candidates not dispatched (cycle cancelled mid-way).
    pub skipped: usize,
    pub content_changed: usize,
    pub cache_invalidated: bool,
    pub elapsed_ms: u64,
}

impl CycleSummary {
    /// Total links that reached a terminal state this cycle.
    pub fn processed(&self) -> usize {
        self.done + self.failed
    }
}

/// One entry of a ranked list returned by a [`crate::Ranker`].
///
/// `score` is source-specific: BM25 relevance for keyword ranking (more
/// negative is better), cosine distance for vector ranking (lower is
/// better). Fusion only consumes the ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedHit {
    pub id: Uuid,
    pub score: f32,
}

/// A fused search hit: link summary plus ranking provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub link: LinkSummary,
    /// 1-based position in the keyword ranking, if the link appeared there.
    pub keyword_rank: Option<usize>,
    pub keyword_score: Option<f32>,
    /// 1-based position in the vector ranking, if the link appeared there.
    pub vector_rank: Option<usize>,
    pub vector_distance: Option<f32>,
    /// Weighted reciprocal-rank-fusion score.
    pub score: f64,
}

/// The cached unit: one fused ranking for one (query, weights) combination.
///
/// Immutable once created; a new query+weights combination always produces
/// a new response, never an in-place update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Normalized query text the response was computed for.
    pub query: String,
    pub keyword_weight: f32,
    pub vector_weight: f32,
    /// Fused ranking up to the fusion depth ceiling (unpaginated superset).
    pub results: Vec<SearchResult>,
    /// Distinct link ids considered pre-pagination.
    pub total_count: usize,
    /// True when one ranking source failed and the response was computed
    /// from the other alone.
    pub partial: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SearchResponse {
    /// Apply offset/limit to the cached superset.
    pub fn page(&self, limit: usize, offset: usize) -> Vec<SearchResult> {
        self.results
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Normalize a URL for uniqueness checks: strip the fragment and trailing
/// slashes from the path. A root path stays `/`, so every spelling of the
/// root page maps to the same string.
pub fn normalize_url(raw: &str) -> Result<String, url::ParseError> {
    let mut parsed = url::Url::parse(raw)?;
    parsed.set_fragment(None);
    let trimmed = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_link_request_defaults() {
        let req = CreateLinkRequest::new("https://example.com/post");
        assert_eq!(req.url, "https://example.com/post");
        assert!(req.notes.is_none());
        assert!(req.tags.is_empty());
    }

    #[test]
    fn test_crawl_policy_serialization() {
        let policy = CrawlPolicy::Stale { days: 7 };
        let json = serde_json::to_string(&policy).unwrap();
        let back: CrawlPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CrawlPolicy::Stale { days: 7 });

        let url = CrawlPolicy::Url("https://example.com".to_string());
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(serde_json::from_str::<CrawlPolicy>(&json).unwrap(), url);
    }

    #[test]
    fn test_content_digest_tracks_text_identity() {
        assert_eq!(content_digest("same"), content_digest("same"));
        assert_ne!(content_digest("one"), content_digest("two"));
    }

    #[test]
    fn test_cycle_summary_processed() {
        let summary = CycleSummary {
            done: 3,
            failed: 2,
            skipped: 1,
            ..Default::default()
        };
        assert_eq!(summary.processed(), 5);
    }

    #[test]
    fn test_search_response_page() {
        let now = Utc::now();
        let results: Vec<SearchResult> = (0..10)
            .map(|i| SearchResult {
                link: LinkSummary {
                    id: Uuid::new_v4(),
                    url: format!("https://example.com/{}", i),
                    title: None,
                    description: None,
                    added_at: now,
                },
                keyword_rank: Some(i + 1),
                keyword_score: None,
                vector_rank: None,
                vector_distance: None,
                score: 1.0 / (61 + i) as f64,
            })
            .collect();

        let response = SearchResponse {
            query: "rust".to_string(),
            keyword_weight: 1.0,
            vector_weight: 0.0,
            results,
            total_count: 10,
            partial: false,
            created_at: now,
            expires_at: now,
        };

        let page = response.page(3, 4);
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].keyword_rank, Some(5));

        // Offset past the superset yields an empty page, not an error.
        assert!(response.page(5, 50).is_empty());
    }

    #[test]
    fn test_normalize_url_strips_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.com/docs/#intro").unwrap(),
            "https://example.com/docs"
        );
        assert_eq!(
            normalize_url("https://example.com/a/b/").unwrap(),
            "https://example.com/a/b"
        );
    }

    #[test]
    fn test_normalize_url_root_spellings_converge() {
        // Both spellings of the root page are the same link.
        assert_eq!(
            normalize_url("https://example.com").unwrap(),
            normalize_url("https://example.com/").unwrap(),
        );
        assert_eq!(
            normalize_url("https://example.com").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("https://example.com/#top").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_normalize_url_rejects_garbage() {
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_search_response_round_trip() {
        let now = Utc::now();
        let response = SearchResponse {
            query: "hybrid search".to_string(),
            keyword_weight: 0.5,
            vector_weight: 0.5,
            results: vec![],
            total_count: 0,
            partial: true,
            created_at: now,
            expires_at: now,
        };
        let json = serde_json::to_string(&response).unwrap();
        let back: SearchResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.query, "hybrid search");
        assert!(back.partial);
        assert_eq!(back.total_count, 0);
    }
}
