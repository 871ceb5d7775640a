//! Link store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tether_core::{
    content_digest, normalize_url, CrawlContent, CrawlPolicy, CreateLinkRequest, Error, Link,
    LinkStore, LinkSummary, Result, UpdateLinkMetadataRequest,
};

/// PostgreSQL implementation of [`LinkStore`].
pub struct PgLinkStore {
    pool: Pool<Postgres>,
}

impl PgLinkStore {
    /// Create a new PgLinkStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_link(row: &sqlx::postgres::PgRow) -> Link {
    Link {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        notes: row.get("notes"),
        tags: row.get("tags"),
        hidden: row.get("hidden"),
        added_at: row.get("added_at"),
        updated_at: row.get("updated_at"),
        crawled_at: row.get("crawled_at"),
        http_status: row.get("http_status"),
        crawl_error: row.get("crawl_error"),
        has_embedding: row.get("has_embedding"),
    }
}

fn row_to_summary(row: &sqlx::postgres::PgRow) -> LinkSummary {
    LinkSummary {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        description: row.get("description"),
        added_at: row.get("added_at"),
    }
}

const LINK_COLUMNS: &str = "id, url, title, description, content, notes, tags, hidden, \
     added_at, updated_at, crawled_at, http_status, crawl_error, \
     embedding IS NOT NULL AS has_embedding";

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn add(&self, req: CreateLinkRequest) -> Result<Uuid> {
        let url = normalize_url(&req.url)
            .map_err(|e| Error::InvalidInput(format!("invalid URL {:?}: {}", req.url, e)))?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO links (id, url, notes, tags, hidden, added_at, updated_at)
             VALUES ($1, $2, $3, $4, FALSE, $5, $5)",
        )
        .bind(id)
        .bind(&url)
        .bind(&req.notes)
        .bind(&req.tags)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::InvalidInput(format!("URL already exists: {}", url))
            }
            _ => Error::Database(e),
        })?;

        Ok(id)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Link> {
        let row = sqlx::query(&format!("SELECT {} FROM links WHERE id = $1", LINK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(|r| row_to_link(&r)).ok_or(Error::LinkNotFound(id))
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Link>> {
        let url = normalize_url(url)
            .map_err(|e| Error::InvalidInput(format!("invalid URL {:?}: {}", url, e)))?;
        let row = sqlx::query(&format!(
            "SELECT {} FROM links WHERE url = $1",
            LINK_COLUMNS
        ))
        .bind(&url)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| row_to_link(&r)))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<LinkSummary>> {
        let rows = sqlx::query(
            "SELECT id, url, title, description, added_at
             FROM links
             ORDER BY updated_at DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_summary).collect())
    }

    async fn update_metadata(&self, id: Uuid, req: UpdateLinkMetadataRequest) -> Result<()> {
        let result = sqlx::query(
            "UPDATE links SET
                 title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 notes = COALESCE($4, notes),
                 tags = COALESCE($5, tags),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.description)
        .bind(&req.notes)
        .bind(&req.tags)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::LinkNotFound(id));
        }
        Ok(())
    }

    async fn update_crawl_result(
        &self,
        id: Uuid,
        content: CrawlContent,
        http_status: Option<i32>,
        crawl_error: Option<String>,
        crawled_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the row so concurrent cycles cannot interleave the compare
        // with the write.
        let row = sqlx::query("SELECT content FROM links WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::LinkNotFound(id))?;

        let old_content: Option<String> = row.get("content");
        // Digest comparison, not text comparison: the extractor already
        // hashed the new text, only the stored side is hashed here.
        let new_digest = content.content.as_deref().map(|text| {
            content
                .content_digest
                .clone()
                .unwrap_or_else(|| content_digest(text))
        });
        let old_digest = old_content.as_deref().map(content_digest);
        let content_changed = new_digest.is_some() && new_digest != old_digest;

        sqlx::query(
            "UPDATE links SET
                 title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 content = COALESCE($4, content),
                 crawled_at = $5,
                 http_status = $6,
                 crawl_error = $7,
                 embedding = CASE WHEN $8 THEN NULL ELSE embedding END,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&content.title)
        .bind(&content.description)
        .bind(&content.content)
        .bind(crawled_at)
        .bind(http_status)
        .bind(&crawl_error)
        .bind(content_changed)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(content_changed)
    }

    async fn set_hidden(&self, id: Uuid, hidden: bool) -> Result<()> {
        let result = sqlx::query("UPDATE links SET hidden = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(hidden)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::LinkNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::LinkNotFound(id));
        }
        Ok(())
    }

    async fn list_candidates(&self, policy: &CrawlPolicy) -> Result<Vec<Uuid>> {
        let rows = match policy {
            CrawlPolicy::All => {
                sqlx::query("SELECT id FROM links WHERE hidden = FALSE ORDER BY added_at")
                    .fetch_all(&self.pool)
                    .await
            }
            CrawlPolicy::Missing => {
                sqlx::query(
                    "SELECT id FROM links
                     WHERE hidden = FALSE AND crawled_at IS NULL
                     ORDER BY added_at",
                )
                .fetch_all(&self.pool)
                .await
            }
            CrawlPolicy::Stale { days } => {
                sqlx::query(
                    "SELECT id FROM links
                     WHERE hidden = FALSE
                       AND (crawled_at IS NULL
                            OR crawled_at < NOW() - make_interval(days => $1::int))
                     ORDER BY added_at",
                )
                .bind(*days as i32)
                .fetch_all(&self.pool)
                .await
            }
            CrawlPolicy::Url(url) => {
                let url = normalize_url(url)
                    .map_err(|e| Error::InvalidInput(format!("invalid URL {:?}: {}", url, e)))?;
                // Explicit target: hidden links are fair game.
                sqlx::query("SELECT id FROM links WHERE url = $1")
                    .bind(url)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(Error::Database)?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn fetch_summaries(&self, ids: &[Uuid]) -> Result<Vec<LinkSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, url, title, description, added_at
             FROM links WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_summary).collect())
    }

    async fn store_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE links SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(Vector::from(embedding.to_vec()))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::LinkNotFound(id));
        }
        Ok(())
    }

    async fn ids_missing_embedding(&self, limit: i64) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT id FROM links
             WHERE hidden = FALSE
               AND embedding IS NULL
               AND (content IS NOT NULL OR title IS NOT NULL OR notes IS NOT NULL)
             ORDER BY added_at
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }
}

impl PgLinkStore {
    /// Count all links, hidden ones included.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM links")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("count"))
    }

    /// Text a link's embedding is generated from: title, description,
    /// notes, tags, then extracted content.
    pub async fn embedding_input(&self, id: Uuid) -> Result<String> {
        let link = self.get_by_id(id).await?;
        let mut parts: Vec<String> = Vec::new();
        if let Some(title) = link.title {
            parts.push(title);
        }
        if let Some(description) = link.description {
            parts.push(description);
        }
        if let Some(notes) = link.notes {
            parts.push(notes);
        }
        if !link.tags.is_empty() {
            parts.push(link.tags.join(" "));
        }
        if let Some(content) = link.content {
            parts.push(content);
        }
        Ok(parts.join("\n\n"))
    }
}
