//! L2 normalization so that inner product equals cosine similarity.
//!
//! Zero vectors cannot be scaled to unit length. They are left as all-zero
//! rows (inner product 0 against everything) and reported back to the caller,
//! never turned into NaN. Callers that want a hard failure instead can pass the
//! report to [`ensure_non_degenerate`].

use routerag_core::RouteragError;
use tracing::warn;

use crate::matrix::EmbeddingMatrix;

/// Euclidean norm, accumulated in `f64`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter()
        .map(|x| {
            let x = f64::from(*x);
            x * x
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Inner product of two equal-length vectors.
///
/// Extra elements of the longer slice are ignored; callers check dimensions.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum::<f64>() as f32
}

/// Scale `v` in place to unit length.
///
/// Returns `false` and leaves `v` untouched when its norm is zero.
///
/// # Examples
///
/// ```
/// use routerag_index::normalize::{l2_norm, normalize};
///
/// let mut v = vec![3.0, 4.0];
/// assert!(normalize(&mut v));
/// assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
///
/// let mut zero = vec![0.0, 0.0];
/// assert!(!normalize(&mut zero));
/// assert_eq!(zero, vec![0.0, 0.0]);
/// ```
pub fn normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Normalize every row of `matrix` in place.
///
/// Returns the positions of rows that were zero vectors and therefore left
/// unchanged.
///
/// # Examples
///
/// ```
/// use routerag_index::matrix::EmbeddingMatrix;
/// use routerag_index::normalize::normalize_rows;
///
/// let mut m = EmbeddingMatrix::from_rows(vec![vec![2.0, 0.0], vec![0.0, 0.0]]).unwrap();
/// let zero_rows = normalize_rows(&mut m);
/// assert_eq!(zero_rows, vec![1]);
/// assert_eq!(m.row(0), &[1.0, 0.0]);
/// ```
pub fn normalize_rows(matrix: &mut EmbeddingMatrix) -> Vec<usize> {
    let mut zero_rows = Vec::new();
    for (i, row) in matrix.rows_mut().enumerate() {
        if !normalize(row) {
            zero_rows.push(i);
        }
    }
    if !zero_rows.is_empty() {
        warn!(
            count = zero_rows.len(),
            first = zero_rows[0],
            "zero-norm embeddings left as zero vectors"
        );
    }
    zero_rows
}

/// Turn a zero-row report into an error.
///
/// # Errors
///
/// Returns [`RouteragError::DegenerateVector`] naming the first zero row.
pub fn ensure_non_degenerate(zero_rows: &[usize]) -> Result<(), RouteragError> {
    match zero_rows.first() {
        Some(&row) => Err(RouteragError::DegenerateVector { row }),
        None => Ok(()),
    }
}
