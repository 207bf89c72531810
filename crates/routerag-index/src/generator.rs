//! Batched, order-preserving embedding generation.

use indicatif::ProgressBar;
use routerag_core::RouteragError;
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::matrix::EmbeddingMatrix;
use crate::normalize::{normalize, normalize_rows};

/// Turns texts into an L2-normalized [`EmbeddingMatrix`].
///
/// Texts are split into consecutive batches of at most `batch_size` and sent
/// one batch at a time; row `i` of the result is the vector of text `i`. Any
/// provider failure aborts the whole run, nothing is retried.
///
/// # Examples
///
/// ```no_run
/// use routerag_index::embedding::EmbeddingClient;
/// use routerag_index::generator::EmbeddingGenerator;
///
/// # async fn example() {
/// let client = EmbeddingClient::new("key");
/// let generator = EmbeddingGenerator::new(&client, 32);
/// let matrix = generator.generate(&["hello".to_string()]).await.unwrap();
/// assert_eq!(matrix.len(), 1);
/// # }
/// ```
pub struct EmbeddingGenerator<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
    progress: ProgressBar,
}

impl<'a> EmbeddingGenerator<'a> {
    /// Create a generator. A `batch_size` of zero is treated as one.
    pub fn new(embedder: &'a dyn Embedder, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report batch progress on `bar`. Its length is set by [`generate`](Self::generate).
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    /// Texts per provider call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed and normalize `texts`.
    ///
    /// Empty input returns an empty matrix without calling the provider.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Embedding`] if a provider call fails, returns
    /// the wrong number of vectors, returns vectors of inconsistent dimension,
    /// or returns non-finite values.
    pub async fn generate(&self, texts: &[String]) -> Result<EmbeddingMatrix, RouteragError> {
        if texts.is_empty() {
            debug!("no texts to embed");
            return Ok(EmbeddingMatrix::empty());
        }

        let batches = texts.len().div_ceil(self.batch_size);
        self.progress.set_length(batches as u64);
        info!(
            texts = texts.len(),
            batch_size = self.batch_size,
            batches,
            "generating embeddings"
        );

        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        let mut dimensions = None;

        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.embedder.embed(batch).await?;
            check_batch(&vectors, batch.len(), batch_no, &mut dimensions)?;
            debug!(batch = batch_no, size = batch.len(), "batch embedded");
            rows.extend(vectors);
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        let mut matrix = EmbeddingMatrix::from_rows(rows)?;
        normalize_rows(&mut matrix);
        Ok(matrix)
    }

    /// Embed and normalize a single text with one provider call.
    ///
    /// A zero vector from the provider is returned unchanged.
    ///
    /// # Errors
    ///
    /// Same conditions as [`generate`](Self::generate).
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RouteragError> {
        let batch = [text.to_string()];
        let vectors = self.embedder.embed(&batch).await?;
        check_batch(&vectors, 1, 0, &mut None)?;
        let mut vector = vectors.into_iter().next().unwrap_or_default();
        normalize(&mut vector);
        Ok(vector)
    }
}

fn check_batch(
    vectors: &[Vec<f32>],
    expected: usize,
    batch_no: usize,
    dimensions: &mut Option<usize>,
) -> Result<(), RouteragError> {
    if vectors.len() != expected {
        return Err(RouteragError::Embedding(format!(
            "batch {batch_no}: provider returned {} vectors for {expected} texts",
            vectors.len()
        )));
    }

    for vector in vectors {
        if vector.is_empty() {
            return Err(RouteragError::Embedding(format!(
                "batch {batch_no}: provider returned an empty vector"
            )));
        }
        let expected_dim = *dimensions.get_or_insert(vector.len());
        if vector.len() != expected_dim {
            return Err(RouteragError::Embedding(format!(
                "batch {batch_no}: vector has {} dimensions, earlier vectors have {expected_dim}",
                vector.len()
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RouteragError::Embedding(format!(
                "batch {batch_no}: provider returned a non-finite value"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::normalize::l2_norm;

    /// Deterministic embedder: the vector is derived from the text itself, so
    /// any reordering shows up as a wrong row.
    #[derive(Default)]
    struct EchoEmbedder {
        calls: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
    }

    fn vector_for(text: &str) -> Vec<f32> {
        let n: f32 = text
            .trim_start_matches("chunk-")
            .parse()
            .unwrap_or(0.0);
        vec![1.0, n, (n * 0.5) + 1.0]
    }

    #[async_trait]
    impl Embedder for EchoEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RouteragError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|t| vector_for(t)).collect())
        }
    }

    /// Returns one vector too few.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RouteragError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Changes dimension between calls.
    #[derive(Default)]
    struct DriftingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for DriftingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RouteragError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0; 2 + call]).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RouteragError> {
            Err(RouteragError::Embedding("401 Unauthorized".into()))
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk-{i}")).collect()
    }

    fn expected_row(i: usize) -> Vec<f32> {
        let mut v = vector_for(&format!("chunk-{i}"));
        normalize(&mut v);
        v
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let embedder = EchoEmbedder::default();
        let generator = EmbeddingGenerator::new(&embedder, 4);
        let matrix = generator.generate(&[]).await.unwrap();
        assert!(matrix.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn uneven_batches_preserve_length_and_order() {
        let embedder = EchoEmbedder::default();
        let generator = EmbeddingGenerator::new(&embedder, 4);
        let matrix = generator.generate(&texts(10)).await.unwrap();

        assert_eq!(matrix.len(), 10);
        assert_eq!(*embedder.batch_sizes.lock().unwrap(), vec![4, 4, 2]);
        for i in 0..10 {
            let expected = expected_row(i);
            for (a, b) in matrix.row(i).iter().zip(&expected) {
                assert!((a - b).abs() < 1e-6, "row {i} does not match chunk {i}");
            }
        }
    }

    #[tokio::test]
    async fn batch_larger_than_input_is_one_call() {
        let embedder = EchoEmbedder::default();
        let generator = EmbeddingGenerator::new(&embedder, 64);
        let matrix = generator.generate(&texts(5)).await.unwrap();
        assert_eq!(matrix.len(), 5);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batch_size_one_is_one_call_per_text() {
        let embedder = EchoEmbedder::default();
        let generator = EmbeddingGenerator::new(&embedder, 1);
        let matrix = generator.generate(&texts(7)).await.unwrap();
        assert_eq!(matrix.len(), 7);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn output_rows_are_unit_length() {
        let embedder = EchoEmbedder::default();
        let generator = EmbeddingGenerator::new(&embedder, 3);
        let matrix = generator.generate(&texts(8)).await.unwrap();
        for row in matrix.rows() {
            assert!((l2_norm(row) - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn short_response_fails_loudly() {
        let generator = EmbeddingGenerator::new(&ShortEmbedder, 3);
        let err = generator.generate(&texts(3)).await.unwrap_err();
        assert!(matches!(err, RouteragError::Embedding(_)));
        assert!(err.to_string().contains("2 vectors for 3 texts"));
    }

    #[tokio::test]
    async fn dimension_drift_between_batches_fails() {
        let embedder = DriftingEmbedder::default();
        let generator = EmbeddingGenerator::new(&embedder, 2);
        let err = generator.generate(&texts(4)).await.unwrap_err();
        assert!(err.to_string().contains("batch 1"));
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let generator = EmbeddingGenerator::new(&FailingEmbedder, 2);
        let err = generator.generate(&texts(3)).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn embed_one_normalizes() {
        let embedder = EchoEmbedder::default();
        let generator = EmbeddingGenerator::new(&embedder, 8);
        let v = generator.embed_one("chunk-3").await.unwrap();
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let embedder = EchoEmbedder::default();
        assert_eq!(EmbeddingGenerator::new(&embedder, 0).batch_size(), 1);
    }
}
