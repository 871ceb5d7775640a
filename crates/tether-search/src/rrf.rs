//! Weighted Reciprocal Rank Fusion for combining keyword and vector rankings.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use tether_core::defaults::RRF_K;
use tether_core::RankedHit;

/// One fused entry: combined score plus per-source provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedHit {
    pub id: Uuid,
    /// Weighted RRF score, higher is better.
    pub score: f64,
    /// 1-based rank in the keyword list, if present there.
    pub keyword_rank: Option<usize>,
    pub keyword_score: Option<f32>,
    /// 1-based rank in the vector list, if present there.
    pub vector_rank: Option<usize>,
    pub vector_distance: Option<f32>,
}

/// Fuse a keyword ranking and a vector ranking with weighted RRF.
///
/// Each list contributes `weight / (K + rank)` per entry, with 1-based
/// ranks. A link present in both lists sums both contributions. Output is
/// sorted by score descending; exact ties order by ascending id so repeated
/// queries return identical lists.
pub fn rrf_fuse(
    keyword: &[RankedHit],
    vector: &[RankedHit],
    keyword_weight: f32,
    vector_weight: f32,
) -> Vec<FusedHit> {
    rrf_fuse_with_k(keyword, vector, keyword_weight, vector_weight, RRF_K)
}

/// [`rrf_fuse`] with an explicit smoothing constant, for tests that probe
/// the constant's effect.
pub fn rrf_fuse_with_k(
    keyword: &[RankedHit],
    vector: &[RankedHit],
    keyword_weight: f32,
    vector_weight: f32,
    k: f32,
) -> Vec<FusedHit> {
    let mut fused: HashMap<Uuid, FusedHit> = HashMap::new();

    for (i, hit) in keyword.iter().enumerate() {
        let rank = i + 1;
        let contribution = keyword_weight as f64 / (k as f64 + rank as f64);
        let entry = fused.entry(hit.id).or_insert(FusedHit {
            id: hit.id,
            score: 0.0,
            keyword_rank: None,
            keyword_score: None,
            vector_rank: None,
            vector_distance: None,
        });
        entry.score += contribution;
        entry.keyword_rank = Some(rank);
        entry.keyword_score = Some(hit.score);
    }

    for (i, hit) in vector.iter().enumerate() {
        let rank = i + 1;
        let contribution = vector_weight as f64 / (k as f64 + rank as f64);
        let entry = fused.entry(hit.id).or_insert(FusedHit {
            id: hit.id,
            score: 0.0,
            keyword_rank: None,
            keyword_score: None,
            vector_rank: None,
            vector_distance: None,
        });
        entry.score += contribution;
        entry.vector_rank = Some(rank);
        entry.vector_distance = Some(hit.score);
    }

    let mut results: Vec<FusedHit> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    debug!(
        subsystem = "search",
        component = "rrf",
        keyword_hits = keyword.len(),
        vector_hits = vector.len(),
        result_count = results.len(),
        "RRF fusion complete"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: Uuid, score: f32) -> RankedHit {
        RankedHit { id, score }
    }

    fn sorted_ids(n: usize) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_fuse_equal_weights_worked_example() {
        // Keyword: A, B, C. Vector: B, A, D. Weights 0.5 / 0.5.
        let ids = sorted_ids(4);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

        let keyword = vec![hit(a, -1.2), hit(b, -1.0), hit(c, -0.8)];
        let vector = vec![hit(b, 0.2), hit(a, 0.3), hit(d, 0.4)];

        let results = rrf_fuse(&keyword, &vector, 0.5, 0.5);
        assert_eq!(results.len(), 4);

        // A and B have identical fused scores (0.5/61 + 0.5/62 each);
        // the tie resolves by ascending id.
        assert!((results[0].score - results[1].score).abs() < 1e-12);
        assert_eq!(results[0].id, a);
        assert_eq!(results[1].id, b);

        // C and D tie at 0.5/63 and order by id too.
        assert_eq!(results[2].id, c);
        assert_eq!(results[3].id, d);

        let expected_top = 0.5 / 61.0 + 0.5 / 62.0;
        assert!((results[0].score - expected_top).abs() < 1e-12);
    }

    #[test]
    fn test_fuse_preserves_provenance() {
        let ids = sorted_ids(2);
        let (a, b) = (ids[0], ids[1]);

        let keyword = vec![hit(a, -2.5)];
        let vector = vec![hit(a, 0.1), hit(b, 0.7)];

        let results = rrf_fuse(&keyword, &vector, 0.5, 0.5);

        let fa = results.iter().find(|h| h.id == a).unwrap();
        assert_eq!(fa.keyword_rank, Some(1));
        assert_eq!(fa.keyword_score, Some(-2.5));
        assert_eq!(fa.vector_rank, Some(1));
        assert_eq!(fa.vector_distance, Some(0.1));

        let fb = results.iter().find(|h| h.id == b).unwrap();
        assert_eq!(fb.keyword_rank, None);
        assert_eq!(fb.keyword_score, None);
        assert_eq!(fb.vector_rank, Some(2));
    }

    #[test]
    fn test_fuse_weight_shifts_ordering() {
        let ids = sorted_ids(2);
        let (a, b) = (ids[0], ids[1]);

        // a tops keyword, b tops vector.
        let keyword = vec![hit(a, -1.0), hit(b, -0.5)];
        let vector = vec![hit(b, 0.1), hit(a, 0.2)];

        let keyword_heavy = rrf_fuse(&keyword, &vector, 0.9, 0.1);
        assert_eq!(keyword_heavy[0].id, a);

        let vector_heavy = rrf_fuse(&keyword, &vector, 0.1, 0.9);
        assert_eq!(vector_heavy[0].id, b);
    }

    #[test]
    fn test_fuse_zero_weight_side_contributes_nothing() {
        let ids = sorted_ids(2);
        let (a, b) = (ids[0], ids[1]);

        let keyword = vec![hit(a, -1.0)];
        let vector = vec![hit(b, 0.1)];

        let results = rrf_fuse(&keyword, &vector, 1.0, 0.0);
        assert_eq!(results[0].id, a);
        // b still appears (it was ranked) but with zero fused score.
        let fb = results.iter().find(|h| h.id == b).unwrap();
        assert_eq!(fb.score, 0.0);
    }

    #[test]
    fn test_fuse_empty_inputs() {
        let results = rrf_fuse(&[], &[], 0.5, 0.5);
        assert!(results.is_empty());
    }

    #[test]
    fn test_fuse_one_empty_list() {
        let ids = sorted_ids(2);
        let keyword = vec![hit(ids[0], -1.0), hit(ids[1], -0.5)];

        let results = rrf_fuse(&keyword, &[], 0.5, 0.5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, ids[0]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_fuse_dual_presence_beats_single_presence() {
        let ids = sorted_ids(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        // b appears in both lists at middling ranks; a and c top one each.
        let keyword = vec![hit(a, -1.0), hit(b, -0.5)];
        let vector = vec![hit(c, 0.1), hit(b, 0.2)];

        let results = rrf_fuse(&keyword, &vector, 0.5, 0.5);
        assert_eq!(results[0].id, b);
    }

    #[test]
    fn test_smaller_k_emphasizes_top_ranks() {
        let ids = sorted_ids(2);
        let (a, b) = (ids[0], ids[1]);

        let keyword = vec![hit(a, -1.0), hit(b, -0.5)];
        let small_k = rrf_fuse_with_k(&keyword, &[], 1.0, 0.0, 1.0);
        let large_k = rrf_fuse_with_k(&keyword, &[], 1.0, 0.0, 1000.0);

        let gap_small = small_k[0].score - small_k[1].score;
        let gap_large = large_k[0].score - large_k[1].score;
        assert!(gap_small > gap_large);
    }
}
