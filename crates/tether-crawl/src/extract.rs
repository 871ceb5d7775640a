//! HTML content and link extraction with the scraper crate.

use std::collections::BTreeSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use tether_core::defaults::CONTENT_MAX_CHARS;
use tether_core::{content_digest, normalize_url, CrawlContent};

/// Selectors tried in order for the main content region; the first match
/// wins, with `<body>` as the final fallback.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".content",
    ".post-content",
    ".article-content",
    "#content",
    ".markdown-body",
    ".prose",
];

const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "head"];

/// Extracted page fields plus a digest of the body text for change
/// detection.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: Option<String>,
    /// SHA-256 of the extracted text, empty-string hash when absent.
    pub digest: String,
}

impl ExtractedContent {
    pub fn into_crawl_content(self) -> CrawlContent {
        CrawlContent {
            title: self.title,
            description: self.description,
            content: self.text,
            content_digest: Some(self.digest),
        }
    }
}

/// Extract title, description, and readable body text from HTML.
pub fn extract_content(html: &str) -> ExtractedContent {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let description = extract_description(&document);
    let text = extract_body_text(&document);

    let digest = content_digest(text.as_deref().unwrap_or(""));

    ExtractedContent {
        title,
        description,
        text,
        digest,
    }
}

/// `<title>`, else the first `<h1>`.
fn extract_title(document: &Html) -> Option<String> {
    for selector in ["title", "h1"] {
        if let Ok(sel) = Selector::parse(selector) {
            if let Some(el) = document.select(&sel).next() {
                let text = el.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// `meta[name=description]`, else `meta[property=og:description]`.
fn extract_description(document: &Html) -> Option<String> {
    for selector in [
        "meta[name=\"description\"]",
        "meta[property=\"og:description\"]",
    ] {
        if let Ok(sel) = Selector::parse(selector) {
            if let Some(content) = document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content"))
            {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

fn extract_body_text(document: &Html) -> Option<String> {
    let region = CONTENT_SELECTORS
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|selector| Selector::parse(selector).ok())
        .find_map(|sel| document.select(&sel).next())?;

    let mut parts = Vec::new();
    collect_text(region, &mut parts);
    if parts.is_empty() {
        return None;
    }

    let mut text = parts.join("\n");
    if text.chars().count() > CONTENT_MAX_CHARS {
        text = text.chars().take(CONTENT_MAX_CHARS).collect();
    }
    Some(text)
}

/// Anchors on the page that stay on `base_url`'s site: same scheme and
/// host, path under the base path prefix. Relative hrefs are resolved
/// against the base; results are normalized, deduplicated, sorted, and
/// never include the base page itself.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };
    let normalized_base = normalize_url(base.as_str()).ok();
    let anchor = match Selector::parse("a[href]") {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let mut links = BTreeSet::new();
    for element in document.select(&anchor) {
        let href = match element.value().attr("href") {
            Some(href) => href.trim(),
            None => continue,
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let scheme = href.to_ascii_lowercase();
        if scheme.starts_with("javascript:")
            || scheme.starts_with("mailto:")
            || scheme.starts_with("tel:")
        {
            continue;
        }
        let resolved = match base.join(href) {
            Ok(resolved) => resolved,
            Err(_) => continue,
        };
        let normalized = match normalize_url(resolved.as_str()) {
            Ok(normalized) => normalized,
            Err(_) => continue,
        };
        if normalized_base.as_deref() == Some(normalized.as_str()) {
            continue;
        }
        if same_site_and_prefix(&base, &resolved) {
            links.insert(normalized);
        }
    }
    links.into_iter().collect()
}

/// Same scheme and authority, and the candidate path sits under the base
/// path prefix. A root-path base admits the whole host.
fn same_site_and_prefix(base: &Url, candidate: &Url) -> bool {
    if base.scheme() != candidate.scheme() {
        return false;
    }
    if base.host_str() != candidate.host_str() || base.port_or_known_default() != candidate.port_or_known_default() {
        return false;
    }
    let base_path = base.path().trim_end_matches('/');
    if base_path.is_empty() {
        return true;
    }
    candidate.path().trim_end_matches('/').starts_with(base_path)
}

fn collect_text(element: ElementRef, parts: &mut Vec<String>) {
    use scraper::node::Node;

    if SKIP_TAGS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, parts);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_title_and_description() {
        let html = r#"
            <html>
              <head>
                <title>Rust Async Patterns</title>
                <meta name="description" content="A field guide.">
              </head>
              <body><p>Hello</p></body>
            </html>
        "#;
        let extracted = extract_content(html);
        assert_eq!(extracted.title.as_deref(), Some("Rust Async Patterns"));
        assert_eq!(extracted.description.as_deref(), Some("A field guide."));
    }

    #[test]
    fn test_h1_fallback_for_missing_title() {
        let html = "<html><body><h1>Heading Title</h1><p>Body</p></body></html>";
        let extracted = extract_content(html);
        assert_eq!(extracted.title.as_deref(), Some("Heading Title"));
    }

    #[test]
    fn test_og_description_fallback() {
        let html = r#"
            <html><head>
              <meta property="og:description" content="From OpenGraph">
            </head><body></body></html>
        "#;
        let extracted = extract_content(html);
        assert_eq!(extracted.description.as_deref(), Some("From OpenGraph"));
    }

    #[test]
    fn test_prefers_main_region_over_body() {
        let html = r#"
            <html><body>
              <nav>Navigation noise</nav>
              <main><p>The real content</p></main>
              <footer>Footer noise</footer>
            </body></html>
        "#;
        let extracted = extract_content(html);
        let text = extracted.text.unwrap();
        assert!(text.contains("The real content"));
        assert!(!text.contains("Navigation noise"));
        assert!(!text.contains("Footer noise"));
    }

    #[test]
    fn test_skips_script_and_style() {
        let html = r#"
            <html><body>
              <script>var secret = 1;</script>
              <style>.hidden { display: none; }</style>
              <p>Visible text</p>
            </body></html>
        "#;
        let extracted = extract_content(html);
        let text = extracted.text.unwrap();
        assert!(text.contains("Visible text"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("display"));
    }

    #[test]
    fn test_truncates_very_long_content() {
        let paragraph = "word ".repeat(20_000);
        let html = format!("<html><body><main>{}</main></body></html>", paragraph);
        let extracted = extract_content(&html);
        assert!(extracted.text.unwrap().chars().count() <= CONTENT_MAX_CHARS);
    }

    #[test]
    fn test_digest_tracks_text_changes() {
        let a = extract_content("<html><body><p>version one</p></body></html>");
        let b = extract_content("<html><body><p>version one</p></body></html>");
        let c = extract_content("<html><body><p>version two</p></body></html>");
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
    }

    #[test]
    fn test_empty_document_yields_no_text() {
        let extracted = extract_content("<html><body></body></html>");
        assert!(extracted.text.is_none());
        assert!(extracted.title.is_none());
    }

    #[test]
    fn test_digest_travels_into_crawl_content() {
        let extracted = extract_content("<html><body><p>some text</p></body></html>");
        let digest = extracted.digest.clone();
        let content = extracted.into_crawl_content();
        assert_eq!(content.content_digest.as_deref(), Some(digest.as_str()));
        assert_eq!(digest, content_digest(content.content.as_deref().unwrap()));
    }

    #[test]
    fn test_extract_links_resolves_and_filters() {
        let html = r##"
            <html><body>
              <a href="/docs/guide">Guide</a>
              <a href="tutorial">Relative</a>
              <a href="https://example.com/blog/post">Off-prefix</a>
              <a href="https://other.com/docs/x">Off-site</a>
              <a href="mailto:a@example.com">Mail</a>
              <a href="javascript:void(0)">JS</a>
              <a href="#section">Fragment</a>
            </body></html>
        "##;
        let links = extract_links(html, "https://example.com/docs/");
        assert_eq!(
            links,
            vec![
                "https://example.com/docs/guide".to_string(),
                "https://example.com/docs/tutorial".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_links_root_base_admits_whole_host() {
        let html = r#"
            <html><body>
              <a href="/a">A</a>
              <a href="/b/c">C</a>
              <a href="http://example.com/insecure">Wrong scheme</a>
            </body></html>
        "#;
        let links = extract_links(html, "https://example.com/");
        assert_eq!(
            links,
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b/c".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_links_deduplicates_and_drops_base() {
        let html = r#"
            <html><body>
              <a href="/docs/guide">One</a>
              <a href="/docs/guide#install">Same after normalization</a>
              <a href="/docs/guide/">Same again</a>
              <a href="/docs">The page itself</a>
            </body></html>
        "#;
        let links = extract_links(html, "https://example.com/docs");
        assert_eq!(links, vec!["https://example.com/docs/guide".to_string()]);
    }
}
