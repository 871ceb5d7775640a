//! # tether-db
//!
//! PostgreSQL storage and ranking backends for tether: the link store,
//! the BM25 keyword ranker, the pgvector nearest-neighbor ranker, schema
//! bootstrap, and embedding backfill.

pub mod embeddings;
pub mod links;
pub mod pool;
pub mod schema;
pub mod search;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use tether_core::Result;

pub use embeddings::{embed_missing, BackfillReport};
pub use links::PgLinkStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use schema::init_schema;
pub use search::{PgKeywordRanker, PgVectorRanker};

/// Bundle of all database-backed components sharing one pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Postgres>,
    pub links: Arc<PgLinkStore>,
    pub keyword: Arc<PgKeywordRanker>,
    pub vector: Arc<PgVectorRanker>,
}

impl Database {
    /// Connect with default pool configuration and initialize the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_config(database_url, PoolConfig::default()).await
    }

    /// Connect with custom pool configuration and initialize the schema.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        init_schema(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build from an existing pool. Schema must already exist.
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self {
            links: Arc::new(PgLinkStore::new(pool.clone())),
            keyword: Arc::new(PgKeywordRanker::new(pool.clone())),
            vector: Arc::new(PgVectorRanker::new(pool.clone())),
            pool,
        }
    }

    /// Access the underlying connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}
