//! Crawl cycle scheduler: candidate selection, bounded-concurrency
//! fetching with retry, store writeback, and cache invalidation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tether_core::defaults::{
    CRAWL_BACKOFF_BASE_MS, CRAWL_MAX_ATTEMPTS, CRAWL_MAX_CONCURRENT, FETCH_TIMEOUT_SECS,
};
use tether_core::{
    ContentFetcher, CrawlOutcome, CrawlPolicy, CreateLinkRequest, CycleSummary,
    DiscoverySummary, Error, LinkStore, Result,
};
use tether_search::ResultCache;

use crate::extract::{extract_content, extract_links};

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Simultaneous fetches per batch.
    pub max_concurrent: usize,
    /// Per-attempt fetch timeout.
    pub fetch_timeout: Duration,
    /// Attempts per link before recording a failure.
    pub max_attempts: u32,
    /// Base delay for exponential retry backoff.
    pub backoff_base: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_concurrent: CRAWL_MAX_CONCURRENT,
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
            max_attempts: CRAWL_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(CRAWL_BACKOFF_BASE_MS),
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Create from `TETHER_CRAWL_MAX_CONCURRENT`, `TETHER_FETCH_TIMEOUT_SECS`,
    /// `TETHER_CRAWL_MAX_ATTEMPTS`, and `TETHER_CRAWL_BACKOFF_BASE_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_parse::<usize>("TETHER_CRAWL_MAX_CONCURRENT") {
            config = config.max_concurrent(n);
        }
        if let Some(secs) = env_parse::<u64>("TETHER_FETCH_TIMEOUT_SECS") {
            config = config.fetch_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = env_parse::<u32>("TETHER_CRAWL_MAX_ATTEMPTS") {
            config = config.max_attempts(attempts);
        }
        if let Some(ms) = env_parse::<u64>("TETHER_CRAWL_BACKOFF_BASE_MS") {
            config = config.backoff_base(Duration::from_millis(ms));
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

/// Delay before retry number `attempt + 1`, doubling per attempt.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Runs crawl cycles against a link store.
///
/// One scheduler instance is meant to run one cycle at a time; per-link
/// writes are atomic in the store, so overlapping cycles are safe but
/// wasteful.
pub struct CrawlScheduler {
    store: Arc<dyn LinkStore>,
    fetcher: Arc<dyn ContentFetcher>,
    cache: ResultCache,
    config: CrawlConfig,
    cancelled: AtomicBool,
}

impl CrawlScheduler {
    pub fn new(
        store: Arc<dyn LinkStore>,
        fetcher: Arc<dyn ContentFetcher>,
        cache: ResultCache,
        config: CrawlConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            cache,
            config,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request that the running cycle stop after the current batch.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Run one crawl cycle for `policy`.
    ///
    /// Candidates are fetched in batches of `max_concurrent`; cancellation
    /// is honored between batches, never mid-fetch. If any link reached a
    /// terminal state the search cache is invalidated exactly once, after
    /// all writes.
    pub async fn run_cycle(&self, policy: &CrawlPolicy) -> Result<CycleSummary> {
        let start = Instant::now();
        self.cancelled.store(false, Ordering::SeqCst);

        let candidates = self.store.list_candidates(policy).await?;
        info!(
            subsystem = "crawl",
            component = "scheduler",
            op = "run_cycle",
            policy = ?policy,
            candidates = candidates.len(),
            "Crawl cycle starting"
        );

        let mut summary = CycleSummary::default();

        for (batch_index, batch) in candidates.chunks(self.config.max_concurrent).enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                summary.skipped = candidates.len() - batch_index * self.config.max_concurrent;
                info!(
                    subsystem = "crawl",
                    component = "scheduler",
                    skipped = summary.skipped,
                    "Crawl cycle cancelled"
                );
                break;
            }

            let mut tasks: JoinSet<Result<CrawlOutcome>> = JoinSet::new();
            for &id in batch {
                let store = Arc::clone(&self.store);
                let fetcher = Arc::clone(&self.fetcher);
                let config = self.config.clone();
                tasks.spawn(async move { crawl_link(store, fetcher, &config, id).await });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(outcome)) => {
                        if outcome.success {
                            summary.done += 1;
                        } else {
                            summary.failed += 1;
                        }
                        if outcome.content_changed {
                            summary.content_changed += 1;
                        }
                        debug!(
                            subsystem = "crawl",
                            component = "scheduler",
                            link_id = %outcome.link_id,
                            url = %outcome.url,
                            success = outcome.success,
                            http_status = outcome.http_status,
                            attempt = outcome.attempts,
                            duration_ms = outcome.elapsed_ms,
                            "Link processed"
                        );
                    }
                    Ok(Err(e)) => {
                        summary.failed += 1;
                        warn!(
                            subsystem = "crawl",
                            component = "scheduler",
                            error = %e,
                            "Link crawl aborted by store error"
                        );
                    }
                    Err(e) => {
                        summary.failed += 1;
                        warn!(
                            subsystem = "crawl",
                            component = "scheduler",
                            error = %e,
                            "Crawl task panicked"
                        );
                    }
                }
            }
        }

        // One blanket invalidation per cycle, only if something terminal
        // happened: failures change http_status, which feeds the ranking
        // visibility filter.
        if summary.processed() > 0 {
            self.cache.invalidate_all().await;
            summary.cache_invalidated = true;
        }

        summary.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            subsystem = "crawl",
            component = "scheduler",
            op = "run_cycle",
            done = summary.done,
            failed = summary.failed,
            skipped = summary.skipped,
            content_changed = summary.content_changed,
            cache_invalidated = summary.cache_invalidated,
            duration_ms = summary.elapsed_ms,
            "Crawl cycle complete"
        );
        Ok(summary)
    }

    /// Discover same-site links from one page and add the new ones.
    ///
    /// Fetches `url` once (no retry: discovery is interactive, the caller
    /// can rerun it), extracts anchors that stay on the page's scheme, host,
    /// and path prefix, and adds up to `max_pages` of them that the store
    /// does not already have. Any addition invalidates the search cache
    /// once.
    pub async fn discover(&self, url: &str, max_pages: usize) -> Result<DiscoverySummary> {
        let start = Instant::now();
        let page = self
            .fetcher
            .fetch(url, self.config.fetch_timeout)
            .await
            .map_err(|e| Error::Request(format!("discovery fetch of {} failed: {}", url, e)))?;

        let candidates = extract_links(&page.html, url);
        let mut summary = DiscoverySummary {
            discovered: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates.into_iter().take(max_pages) {
            if self.store.get_by_url(&candidate).await?.is_some() {
                summary.skipped_existing += 1;
                continue;
            }
            self.store.add(CreateLinkRequest::new(candidate.as_str())).await?;
            summary.added += 1;
            debug!(
                subsystem = "crawl",
                component = "scheduler",
                url = %candidate,
                "Link discovered"
            );
        }

        if summary.added > 0 {
            self.cache.invalidate_all().await;
        }

        summary.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            subsystem = "crawl",
            component = "scheduler",
            op = "discover",
            url = %url,
            discovered = summary.discovered,
            added = summary.added,
            skipped_existing = summary.skipped_existing,
            duration_ms = summary.elapsed_ms,
            "Discovery complete"
        );
        Ok(summary)
    }
}

/// Fetch one link with retry, extract, and write the outcome back.
async fn crawl_link(
    store: Arc<dyn LinkStore>,
    fetcher: Arc<dyn ContentFetcher>,
    config: &CrawlConfig,
    id: Uuid,
) -> Result<CrawlOutcome> {
    let start = Instant::now();
    let link = store.get_by_id(id).await?;

    let mut attempt = 0u32;
    let final_error = loop {
        attempt += 1;
        match fetcher.fetch(&link.url, config.fetch_timeout).await {
            Ok(page) => {
                let extracted = extract_content(&page.html);
                let content_changed = store
                    .update_crawl_result(
                        id,
                        extracted.into_crawl_content(),
                        Some(page.http_status as i32),
                        None,
                        Utc::now(),
                    )
                    .await?;
                return Ok(CrawlOutcome {
                    link_id: id,
                    url: link.url,
                    success: true,
                    http_status: Some(page.http_status),
                    error: None,
                    content_changed,
                    attempts: attempt,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                debug!(
                    subsystem = "crawl",
                    component = "scheduler",
                    link_id = %id,
                    url = %link.url,
                    attempt,
                    error = %e.message(),
                    "Transient fetch failure, retrying"
                );
                tokio::time::sleep(backoff_delay(attempt, config.backoff_base)).await;
            }
            Err(e) => break e,
        }
    };

    store
        .update_crawl_result(
            id,
            Default::default(),
            final_error.status().map(|s| s as i32),
            Some(final_error.message().to_string()),
            Utc::now(),
        )
        .await?;

    Ok(CrawlOutcome {
        link_id: id,
        url: link.url,
        success: false,
        http_status: final_error.status(),
        error: Some(final_error.message().to_string()),
        content_changed: false,
        attempts: attempt,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CrawlConfig::default();
        assert_eq!(config.max_concurrent, CRAWL_MAX_CONCURRENT);
        assert_eq!(config.max_attempts, CRAWL_MAX_ATTEMPTS);
        assert_eq!(config.fetch_timeout, Duration::from_secs(FETCH_TIMEOUT_SECS));
    }

    #[test]
    fn test_config_builder_floors() {
        let config = CrawlConfig::new().max_concurrent(0).max_attempts(0);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(1, base), Duration::from_millis(500));
        assert_eq!(backoff_delay(2, base), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3, base), Duration::from_millis(2000));
    }
}
