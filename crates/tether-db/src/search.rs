//! Ranking backends: BM25 keyword search and pgvector nearest-neighbor.
//!
//! Both rankers apply the visibility contract themselves: hidden links and
//! links whose last crawl returned an error status never appear in a
//! ranking, so fusion upstream needs no re-filtering.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};

use tether_core::defaults::MAX_VECTOR_DISTANCE;
use tether_core::{Error, RankQuery, RankedHit, Ranker, Result};

/// Rows excluded from every ranking: hidden links and error pages.
const VISIBLE: &str = "hidden = FALSE AND (http_status IS NULL OR http_status < 400)";

/// BM25 keyword ranker over the generated `search_text` column.
///
/// Scores come back negative (more negative is better); ascending order
/// puts the best hit first.
pub struct PgKeywordRanker {
    pool: Pool<Postgres>,
}

impl PgKeywordRanker {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ranker for PgKeywordRanker {
    async fn rank(&self, query: RankQuery<'_>, k: usize) -> Result<Vec<RankedHit>> {
        let text = match query {
            RankQuery::Text(text) => text,
            RankQuery::Embedding(_) => {
                return Err(Error::InvalidInput(
                    "keyword ranker requires a text query".to_string(),
                ))
            }
        };

        let sql = format!(
            "SELECT id,
                    (search_text <@> to_bm25query($1, 'links_search_bm25_idx'))::float4 AS score
             FROM links
             WHERE {VISIBLE}
               AND search_text <@> to_bm25query($1, 'links_search_bm25_idx') < 0
             ORDER BY score
             LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(text)
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| RankedHit {
                id: row.get("id"),
                score: row.get("score"),
            })
            .collect())
    }
}

/// Cosine-distance vector ranker over the `embedding` column.
///
/// Hits beyond [`MAX_VECTOR_DISTANCE`] are cut off rather than padding the
/// ranking with noise.
pub struct PgVectorRanker {
    pool: Pool<Postgres>,
}

impl PgVectorRanker {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ranker for PgVectorRanker {
    async fn rank(&self, query: RankQuery<'_>, k: usize) -> Result<Vec<RankedHit>> {
        let embedding = match query {
            RankQuery::Embedding(embedding) => embedding,
            RankQuery::Text(_) => {
                return Err(Error::InvalidInput(
                    "vector ranker requires a query embedding".to_string(),
                ))
            }
        };

        let vector = Vector::from(embedding.to_vec());
        let sql = format!(
            "SELECT id, (embedding <=> $1)::float4 AS distance
             FROM links
             WHERE {VISIBLE}
               AND embedding IS NOT NULL
               AND embedding <=> $1 < $3
             ORDER BY distance
             LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(&vector)
            .bind(k as i64)
            .bind(MAX_VECTOR_DISTANCE as f64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| RankedHit {
                id: row.get("id"),
                score: row.get("distance"),
            })
            .collect())
    }
}
