//! Hybrid search orchestration: validate, rank both sources concurrently,
//! fuse, hydrate, cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use tether_core::defaults::{FUSION_DEPTH, MAX_SEARCH_LIMIT};
use tether_core::{
    EmbeddingProvider, Error, LinkStore, RankQuery, RankedHit, Ranker, Result, SearchResponse,
    SearchResult,
};

use crate::cache::{normalize_query, ResultCache};
use crate::rrf::rrf_fuse;

/// Weights and page window for one search. Defaults to an even split over
/// the full fusion depth.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub keyword_weight: f32,
    pub vector_weight: f32,
    /// Page size, clamped to [1, MAX_SEARCH_LIMIT]. Pagination is applied
    /// after fusion; the cache always holds the unpaginated superset.
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            keyword_weight: 0.5,
            vector_weight: 0.5,
            limit: MAX_SEARCH_LIMIT,
            offset: 0,
        }
    }
}

impl SearchOptions {
    pub fn with_weights(keyword_weight: f32, vector_weight: f32) -> Self {
        Self {
            keyword_weight,
            vector_weight,
            ..Self::default()
        }
    }

    /// Keyword ranking only; the vector branch is never dispatched.
    pub fn keyword_only() -> Self {
        Self::with_weights(1.0, 0.0)
    }

    /// Vector ranking only; the keyword branch is never dispatched.
    pub fn vector_only() -> Self {
        Self::with_weights(0.0, 1.0)
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Hybrid search engine over a keyword ranker and a vector ranker.
pub struct HybridSearchEngine {
    store: Arc<dyn LinkStore>,
    keyword: Arc<dyn Ranker>,
    vector: Arc<dyn Ranker>,
    embeddings: Arc<dyn EmbeddingProvider>,
    cache: ResultCache,
}

impl HybridSearchEngine {
    pub fn new(
        store: Arc<dyn LinkStore>,
        keyword: Arc<dyn Ranker>,
        vector: Arc<dyn Ranker>,
        embeddings: Arc<dyn EmbeddingProvider>,
        cache: ResultCache,
    ) -> Self {
        Self {
            store,
            keyword,
            vector,
            embeddings,
            cache,
        }
    }

    /// The cache this engine admits responses into. Mutation paths call
    /// `invalidate_all` through this handle.
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Run a hybrid search. The response carries the requested page of the
    /// fused ranking; `total_count` stays pre-pagination.
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<SearchResponse> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(Error::InvalidQuery("query is empty".to_string()));
        }
        validate_weight(opts.keyword_weight)?;
        validate_weight(opts.vector_weight)?;
        if opts.keyword_weight == 0.0 && opts.vector_weight == 0.0 {
            return Err(Error::InvalidWeight(0.0));
        }
        let limit = clamp_limit(opts.limit);

        let key = self
            .cache
            .cache_key(&normalized, opts.keyword_weight, opts.vector_weight);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(page_of(&cached, limit, opts.offset));
        }

        let start = Instant::now();
        // Epoch read before ranking; put() refuses the response if an
        // invalidation lands in between.
        let epoch = self.cache.current_epoch();

        let keyword_branch = async {
            if opts.keyword_weight > 0.0 {
                Some(
                    self.keyword
                        .rank(RankQuery::Text(&normalized), FUSION_DEPTH)
                        .await,
                )
            } else {
                None
            }
        };
        let vector_branch = async {
            if opts.vector_weight > 0.0 {
                match self.embeddings.embed(&normalized).await {
                    Ok(embedding) => Some(
                        self.vector
                            .rank(RankQuery::Embedding(&embedding), FUSION_DEPTH)
                            .await,
                    ),
                    // An embedding failure degrades the vector branch the
                    // same way a ranking failure would.
                    Err(e) => Some(Err(e)),
                }
            } else {
                None
            }
        };
        let (keyword_out, vector_out) = tokio::join!(keyword_branch, vector_branch);

        let (keyword_hits, keyword_err) = split_branch(keyword_out);
        let (vector_hits, vector_err) = split_branch(vector_out);

        if let Some(e) = &keyword_err {
            warn!(
                subsystem = "search",
                component = "hybrid",
                query = %normalized,
                error = %e,
                "Keyword ranking failed, degrading"
            );
        }
        if let Some(e) = &vector_err {
            warn!(
                subsystem = "search",
                component = "hybrid",
                query = %normalized,
                error = %e,
                "Vector ranking failed, degrading"
            );
        }

        let attempted_keyword = opts.keyword_weight > 0.0;
        let attempted_vector = opts.vector_weight > 0.0;
        let keyword_failed = attempted_keyword && keyword_err.is_some();
        let vector_failed = attempted_vector && vector_err.is_some();
        if (keyword_failed || !attempted_keyword) && (vector_failed || !attempted_vector) {
            let detail = keyword_err
                .or(vector_err)
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no ranking source available".to_string());
            return Err(Error::RetrievalUnavailable(detail));
        }
        let partial = keyword_failed || vector_failed;

        let keyword_hits = keyword_hits.unwrap_or_default();
        let vector_hits = vector_hits.unwrap_or_default();

        let mut fused = rrf_fuse(
            &keyword_hits,
            &vector_hits,
            opts.keyword_weight,
            opts.vector_weight,
        );
        let total_count = fused.len();
        fused.truncate(FUSION_DEPTH);

        // Hydrate in fused order; rows deleted mid-flight just drop out.
        let ids: Vec<_> = fused.iter().map(|h| h.id).collect();
        let summaries = self.store.fetch_summaries(&ids).await?;
        let by_id: std::collections::HashMap<_, _> =
            summaries.into_iter().map(|s| (s.id, s)).collect();

        let results: Vec<SearchResult> = fused
            .into_iter()
            .filter_map(|hit| {
                by_id.get(&hit.id).map(|summary| SearchResult {
                    link: summary.clone(),
                    keyword_rank: hit.keyword_rank,
                    keyword_score: hit.keyword_score,
                    vector_rank: hit.vector_rank,
                    vector_distance: hit.vector_distance,
                    score: hit.score,
                })
            })
            .collect();

        let (created_at, expires_at) = self.cache.expiry_for_now();
        let response = SearchResponse {
            query: normalized.clone(),
            keyword_weight: opts.keyword_weight,
            vector_weight: opts.vector_weight,
            results,
            total_count,
            partial,
            created_at,
            expires_at,
        };

        info!(
            subsystem = "search",
            component = "hybrid",
            op = "search",
            query = %normalized,
            keyword_weight = opts.keyword_weight,
            vector_weight = opts.vector_weight,
            keyword_hits = keyword_hits.len(),
            vector_hits = vector_hits.len(),
            result_count = response.results.len(),
            partial,
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );

        // A degraded response is served but never cached; the next request
        // retries the failed source. The cache stores the superset so one
        // entry serves every page.
        if !partial {
            let admitted = self.cache.put(&key, response.clone(), epoch).await;
            if !admitted {
                debug!(
                    subsystem = "search",
                    component = "hybrid",
                    query = %normalized,
                    "Response computed across an invalidation, not cached"
                );
            }
        }

        Ok(page_of(&response, limit, opts.offset))
    }

    /// Keyword-only search.
    pub async fn text_search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SearchResponse> {
        self.search(query, &SearchOptions::keyword_only().page(limit, offset))
            .await
    }

    /// Vector-only search.
    pub async fn vector_search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SearchResponse> {
        self.search(query, &SearchOptions::vector_only().page(limit, offset))
            .await
    }

    /// [`search`](Self::search) bounded by a deadline.
    pub async fn search_with_deadline(
        &self,
        query: &str,
        opts: &SearchOptions,
        deadline: Duration,
    ) -> Result<SearchResponse> {
        tokio::time::timeout(deadline, self.search(query, opts))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "search exceeded deadline of {} ms",
                    deadline.as_millis()
                ))
            })?
    }
}

/// Clamp a requested page size into [1, MAX_SEARCH_LIMIT]; out-of-range
/// values are corrected, not rejected.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_SEARCH_LIMIT)
}

/// A paged view of a fused response. `total_count` and the superset metadata
/// are preserved; only `results` is windowed.
fn page_of(response: &SearchResponse, limit: usize, offset: usize) -> SearchResponse {
    SearchResponse {
        results: response.page(limit, offset),
        ..response.clone()
    }
}

fn validate_weight(weight: f32) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 || weight > 1.0 {
        return Err(Error::InvalidWeight(weight));
    }
    Ok(())
}

fn split_branch(
    out: Option<Result<Vec<RankedHit>>>,
) -> (Option<Vec<RankedHit>>, Option<Error>) {
    match out {
        Some(Ok(hits)) => (Some(hits), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    }
}
