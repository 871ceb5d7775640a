//! # tether-crawl
//!
//! Crawling for tether: an HTTP fetcher with failure classification,
//! HTML content extraction, and the cycle scheduler that drives both and
//! keeps the search cache honest.

pub mod extract;
pub mod fetcher;
pub mod scheduler;

pub use extract::{extract_content, extract_links, ExtractedContent};
pub use fetcher::HttpFetcher;
pub use scheduler::{backoff_delay, CrawlConfig, CrawlScheduler};
