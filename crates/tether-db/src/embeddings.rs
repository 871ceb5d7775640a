//! Backfill embeddings for links that are missing one.

use tracing::{debug, warn};

use tether_core::defaults::EMBED_MAX_CHARS;
use tether_core::{EmbeddingProvider, LinkStore, Result};

use crate::links::PgLinkStore;

/// Outcome of one backfill pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillReport {
    pub embedded: usize,
    pub failed: usize,
}

/// Embed up to `limit` links missing an embedding.
///
/// Failures are counted and logged per link; one bad link never aborts the
/// pass.
pub async fn embed_missing(
    store: &PgLinkStore,
    provider: &dyn EmbeddingProvider,
    limit: i64,
) -> Result<BackfillReport> {
    let ids = store.ids_missing_embedding(limit).await?;
    let mut report = BackfillReport::default();

    for id in ids {
        let mut input = store.embedding_input(id).await?;
        if input.len() > EMBED_MAX_CHARS {
            let mut cut = EMBED_MAX_CHARS;
            while !input.is_char_boundary(cut) {
                cut -= 1;
            }
            input.truncate(cut);
        }
        if input.trim().is_empty() {
            continue;
        }

        match provider.embed(&input).await {
            Ok(embedding) => {
                store.store_embedding(id, &embedding).await?;
                report.embedded += 1;
                debug!(
                    subsystem = "db",
                    component = "embeddings",
                    op = "embed",
                    link_id = %id,
                    "Embedded link"
                );
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    subsystem = "db",
                    component = "embeddings",
                    op = "embed",
                    link_id = %id,
                    error = %e,
                    "Embedding failed, continuing"
                );
            }
        }
    }

    Ok(report)
}
