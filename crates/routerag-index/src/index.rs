//! Exact inner-product nearest-neighbour search.
//!
//! Every query scans all rows (O(N·D)). Rows are expected to be unit length,
//! so the inner product is the cosine similarity.

use routerag_core::RouteragError;
use serde::Serialize;
use tracing::debug;

use crate::matrix::EmbeddingMatrix;
use crate::normalize::dot;

/// One search result: the row position and its inner product with the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hit {
    /// Row index in the indexed matrix (== chunk position).
    pub row: usize,
    /// Inner product with the query vector.
    pub score: f32,
}

/// Immutable brute-force index over an [`EmbeddingMatrix`].
///
/// There is no insertion or deletion; rebuild from a new matrix instead.
///
/// # Examples
///
/// ```
/// use routerag_index::index::SimilarityIndex;
/// use routerag_index::matrix::EmbeddingMatrix;
///
/// let m = EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
/// let index = SimilarityIndex::build(m);
/// let hits = index.query(&[0.0, 1.0], 1).unwrap();
/// assert_eq!(hits[0].row, 1);
/// ```
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    vectors: EmbeddingMatrix,
}

impl SimilarityIndex {
    /// Take ownership of `vectors` as the index contents.
    pub fn build(vectors: EmbeddingMatrix) -> Self {
        debug!(
            rows = vectors.len(),
            dimensions = vectors.dimensions(),
            "built similarity index"
        );
        Self { vectors }
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimension every query must have.
    pub fn dimensions(&self) -> usize {
        self.vectors.dimensions()
    }

    /// The indexed vectors.
    pub fn vectors(&self) -> &EmbeddingMatrix {
        &self.vectors
    }

    /// Return up to `k` rows with the highest inner product against `vector`.
    ///
    /// Results are sorted by descending score; equal scores are ordered by
    /// ascending row so the output is deterministic. A row scoring NaN (only
    /// possible with a corrupted artifact) sorts after every other row.
    /// `k == 0` or an empty index yields no hits.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::DimensionMismatch`] if `vector` does not have
    /// the index dimension, or [`RouteragError::Index`] if it holds a NaN or
    /// infinite value.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit>, RouteragError> {
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dimensions() {
            return Err(RouteragError::DimensionMismatch {
                expected: self.dimensions(),
                actual: vector.len(),
            });
        }
        if let Some(i) = vector.iter().position(|x| !x.is_finite()) {
            return Err(RouteragError::Index(format!(
                "query vector has a non-finite value at position {i}"
            )));
        }

        let mut hits: Vec<Hit> = self
            .vectors
            .rows()
            .enumerate()
            .map(|(row, v)| Hit {
                row,
                score: dot(v, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            rank(b.score)
                .partial_cmp(&rank(a.score))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.row.cmp(&b.row))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

// NaN has no place in a descending order; treat it as the lowest score.
fn rank(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_rows;
    use proptest::prelude::*;

    fn index_of(rows: Vec<Vec<f32>>) -> SimilarityIndex {
        let mut m = EmbeddingMatrix::from_rows(rows).unwrap();
        normalize_rows(&mut m);
        SimilarityIndex::build(m)
    }

    #[test]
    fn query_finds_closest_row() {
        let index = index_of(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]);
        let hits = index.query(&[0.1, 0.9, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].row, 1);
        assert_eq!(hits[1].row, 0);
    }

    #[test]
    fn self_query_scores_one() {
        let index = index_of(vec![vec![3.0, 4.0], vec![-1.0, 2.0], vec![5.0, 1.0]]);
        for i in 0..index.len() {
            let row = index.vectors().row(i).to_vec();
            let hits = index.query(&row, 1).unwrap();
            assert_eq!(hits[0].row, i);
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn ties_break_by_ascending_row() {
        let index = index_of(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        ]);
        let hits = index.query(&[1.0, 0.0], 4).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![1, 3, 0, 2]);
    }

    #[test]
    fn k_larger_than_index_returns_all_rows() {
        let index = index_of(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.query(&[1.0, 0.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn k_zero_returns_nothing() {
        let index = index_of(vec![vec![1.0, 0.0]]);
        assert!(index.query(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = SimilarityIndex::build(EmbeddingMatrix::empty());
        assert!(index.query(&[1.0, 0.0], 1).unwrap().is_empty());
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let index = index_of(vec![vec![1.0, 0.0, 0.0]]);
        let err = index.query(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            RouteragError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn zero_row_scores_zero_against_everything() {
        let index = index_of(vec![vec![0.0, 0.0], vec![-1.0, 0.0]]);
        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].row, 0);
        assert_eq!(hits[0].score, 0.0);
        assert!((hits[1].score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn nan_row_sorts_last() {
        let m = EmbeddingMatrix::from_rows(vec![
            vec![f32::NAN, 0.0],
            vec![-1.0, 0.0],
            vec![1.0, 0.0],
        ])
        .unwrap();
        let index = SimilarityIndex::build(m);
        let hits = index.query(&[1.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![2, 1, 0]);
        assert!(hits[2].score.is_nan());
    }

    #[test]
    fn non_finite_query_is_rejected() {
        let index = index_of(vec![vec![1.0, 0.0]]);
        for bad in [f32::NAN, f32::INFINITY] {
            let err = index.query(&[bad, 0.0], 1).unwrap_err();
            assert!(matches!(err, RouteragError::Index(_)));
        }
    }

    proptest! {
        #[test]
        fn results_are_bounded_and_sorted(
            rows in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 1..30),
            query in prop::collection::vec(-1.0f32..1.0, 4),
            k in 0usize..40,
        ) {
            let n = rows.len();
            let index = index_of(rows);
            let hits = index.query(&query, k).unwrap();

            prop_assert!(hits.len() <= k);
            prop_assert_eq!(hits.len(), k.min(n));
            for hit in &hits {
                prop_assert!(hit.row < n);
            }
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
                if pair[0].score == pair[1].score {
                    prop_assert!(pair[0].row < pair[1].row);
                }
            }
        }
    }
}
