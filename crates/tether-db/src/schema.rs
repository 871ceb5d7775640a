//! Schema initialization.
//!
//! All statements are idempotent so `init_schema` can run on every startup.

use sqlx::{Pool, Postgres};
use tracing::info;

use tether_core::defaults::EMBED_DIMENSION;
use tether_core::{Error, Result};

/// Create extensions, the links table, and its indexes if absent.
pub async fn init_schema(pool: &Pool<Postgres>) -> Result<()> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await
        .map_err(Error::Database)?;
    sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_textsearch")
        .execute(pool)
        .await
        .map_err(Error::Database)?;

    let create_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS links (
            id UUID PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            title TEXT,
            description TEXT,
            content TEXT,
            notes TEXT,
            tags TEXT[] NOT NULL DEFAULT '{{}}',
            hidden BOOLEAN NOT NULL DEFAULT FALSE,
            added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            crawled_at TIMESTAMPTZ,
            http_status INTEGER,
            crawl_error TEXT,
            embedding vector({EMBED_DIMENSION}),
            search_text TEXT GENERATED ALWAYS AS (
                coalesce(title, '') || ' ' ||
                coalesce(description, '') || ' ' ||
                coalesce(notes, '') || ' ' ||
                array_to_string(tags, ' ') || ' ' ||
                coalesce(content, '')
            ) STORED
        )
        "#
    );
    sqlx::query(&create_table)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS links_search_bm25_idx
         ON links USING bm25 (search_text)",
    )
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS links_embedding_idx
         ON links USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(pool)
    .await
    .map_err(Error::Database)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS links_crawled_at_idx ON links (crawled_at)")
        .execute(pool)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "schema",
        op = "init",
        "Schema initialized"
    );
    Ok(())
}
