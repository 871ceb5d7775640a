//! Integration tests for the PostgreSQL link store and rankers.
//!
//! These need a running PostgreSQL with the `vector` and `pg_textsearch`
//! extensions. Set `TETHER_DATABASE_URL` and run with `--ignored`.

use tether_core::{CrawlContent, CrawlPolicy, CreateLinkRequest, Error, LinkStore};
use tether_db::Database;

async fn test_db() -> Database {
    dotenvy::dotenv().ok();
    let url = std::env::var("TETHER_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("TETHER_DATABASE_URL must be set for integration tests");
    Database::connect(&url).await.expect("connect")
}

fn unique_url(prefix: &str) -> String {
    format!("https://example.com/{}/{}", prefix, uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn test_add_and_get_round_trip() {
    let db = test_db().await;
    let url = unique_url("round-trip");

    let mut req = CreateLinkRequest::new(url.clone());
    req.tags = vec!["rust".to_string(), "async".to_string()];
    let id = db.links.add(req).await.expect("add");

    let link = db.links.get_by_id(id).await.expect("get");
    assert_eq!(link.url, url);
    assert_eq!(link.tags, vec!["rust", "async"]);
    assert!(!link.hidden);
    assert!(link.crawled_at.is_none());
    assert!(!link.has_embedding);

    db.links.delete(id).await.expect("delete");
}

#[tokio::test]
#[ignore]
async fn test_duplicate_url_rejected() {
    let db = test_db().await;
    let url = unique_url("dup");

    let id = db.links.add(CreateLinkRequest::new(url.clone())).await.expect("add");
    // Same page with a fragment normalizes to the same URL.
    let err = db
        .links
        .add(CreateLinkRequest::new(format!("{}#section", url)))
        .await
        .expect_err("duplicate should fail");
    assert!(matches!(err, Error::InvalidInput(_)));

    db.links.delete(id).await.expect("delete");
}

#[tokio::test]
#[ignore]
async fn test_get_missing_link_is_not_found() {
    let db = test_db().await;
    let err = db
        .links
        .get_by_id(uuid::Uuid::new_v4())
        .await
        .expect_err("missing link");
    assert!(matches!(err, Error::LinkNotFound(_)));
}

#[tokio::test]
#[ignore]
async fn test_crawl_result_detects_content_change() {
    let db = test_db().await;
    let id = db
        .links
        .add(CreateLinkRequest::new(unique_url("crawl")))
        .await
        .expect("add");

    // No precomputed digest: the store derives one from the text.
    let content = CrawlContent {
        title: Some("Title".to_string()),
        content: Some("first version".to_string()),
        ..Default::default()
    };
    let changed = db
        .links
        .update_crawl_result(id, content.clone(), Some(200), None, chrono::Utc::now())
        .await
        .expect("first crawl");
    assert!(changed, "first content write is a change");

    // Same content again: no change.
    let changed = db
        .links
        .update_crawl_result(id, content, Some(200), None, chrono::Utc::now())
        .await
        .expect("second crawl");
    assert!(!changed);

    // Changed content clears the embedding.
    db.links.store_embedding(id, &vec![0.1; 768]).await.expect("embed");
    let changed = db
        .links
        .update_crawl_result(
            id,
            CrawlContent {
                content: Some("second version".to_string()),
                content_digest: Some(tether_core::content_digest("second version")),
                ..Default::default()
            },
            Some(200),
            None,
            chrono::Utc::now(),
        )
        .await
        .expect("third crawl");
    assert!(changed);
    let link = db.links.get_by_id(id).await.expect("get");
    assert!(!link.has_embedding, "content change must clear the embedding");

    db.links.delete(id).await.expect("delete");
}

#[tokio::test]
#[ignore]
async fn test_candidate_policies() {
    let db = test_db().await;
    let never = db
        .links
        .add(CreateLinkRequest::new(unique_url("never")))
        .await
        .expect("add");
    let crawled = db
        .links
        .add(CreateLinkRequest::new(unique_url("crawled")))
        .await
        .expect("add");
    db.links
        .update_crawl_result(
            crawled,
            CrawlContent::default(),
            Some(200),
            None,
            chrono::Utc::now(),
        )
        .await
        .expect("crawl");

    let missing = db
        .links
        .list_candidates(&CrawlPolicy::Missing)
        .await
        .expect("missing");
    assert!(missing.contains(&never));
    assert!(!missing.contains(&crawled));

    // Freshly crawled link is not stale at a 7-day threshold.
    let stale = db
        .links
        .list_candidates(&CrawlPolicy::Stale { days: 7 })
        .await
        .expect("stale");
    assert!(stale.contains(&never), "never-crawled counts as stale");
    assert!(!stale.contains(&crawled));

    // Hidden links leave the pool.
    db.links.set_hidden(never, true).await.expect("hide");
    let missing = db
        .links
        .list_candidates(&CrawlPolicy::Missing)
        .await
        .expect("missing after hide");
    assert!(!missing.contains(&never));

    db.links.delete(never).await.expect("delete");
    db.links.delete(crawled).await.expect("delete");
}

#[tokio::test]
#[ignore]
async fn test_fetch_summaries_drops_unknown_ids() {
    let db = test_db().await;
    let id = db
        .links
        .add(CreateLinkRequest::new(unique_url("summaries")))
        .await
        .expect("add");

    let summaries = db
        .links
        .fetch_summaries(&[id, uuid::Uuid::new_v4()])
        .await
        .expect("summaries");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, id);

    db.links.delete(id).await.expect("delete");
}
