//! Similarity routing against embedded category descriptions.

use async_trait::async_trait;
use routerag_core::{Category, CategoryDescription, RouteragError};
use routerag_index::generator::EmbeddingGenerator;
use routerag_index::normalize::{dot, normalize};
use tracing::debug;

/// Unit vectors for each category description, in declared order.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct CategoryVectors {
    entries: Vec<(Category, Vec<f32>)>,
}

impl CategoryVectors {
    /// Embed every description with `generator`.
    ///
    /// # Errors
    ///
    /// Propagates any embedding failure.
    pub async fn build(
        descriptions: &[CategoryDescription],
        generator: &EmbeddingGenerator<'_>,
    ) -> Result<Self, RouteragError> {
        let texts: Vec<String> = descriptions.iter().map(|d| d.description.clone()).collect();
        let matrix = generator.generate(&texts).await?;
        let entries = descriptions
            .iter()
            .zip(matrix.rows())
            .map(|(d, v)| (d.category, v.to_vec()))
            .collect::<Vec<_>>();
        debug!(categories = entries.len(), "embedded category descriptions");
        Ok(Self { entries })
    }

    /// Wrap precomputed vectors. Each vector is normalized in place.
    pub fn from_vectors(entries: Vec<(Category, Vec<f32>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(c, mut v)| {
                normalize(&mut v);
                (c, v)
            })
            .collect();
        Self { entries }
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no category has a vector.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Categories and their unit vectors, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[f32])> {
        self.entries.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    /// Category with the largest inner product against `query`.
    ///
    /// Ties go to the category declared first. Returns `None` when no
    /// categories are configured.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::DimensionMismatch`] if `query` and a category
    /// vector differ in length.
    pub fn best_match(&self, query: &[f32]) -> Result<Option<(Category, f32)>, RouteragError> {
        let mut best: Option<(Category, f32)> = None;
        for (category, vector) in self.iter() {
            if vector.len() != query.len() {
                return Err(RouteragError::DimensionMismatch {
                    expected: vector.len(),
                    actual: query.len(),
                });
            }
            let score = dot(vector, query);
            // Strict comparison keeps the earlier category on equal scores.
            match best {
                Some((_, s)) if score <= s => {}
                _ => best = Some((category, score)),
            }
        }
        Ok(best)
    }
}

/// Second-stage scorer consulted when no keyword rule matches.
#[async_trait]
pub trait CategoryScorer: Send + Sync {
    /// Best category and its similarity score, or `None` if there are no
    /// categories to compare against.
    async fn score(&self, query: &str) -> Result<Option<(Category, f32)>, RouteragError>;
}

/// Embeds the query and picks the most similar category description.
pub struct SemanticRouter<'a, 'e> {
    vectors: &'a CategoryVectors,
    generator: &'a EmbeddingGenerator<'e>,
}

impl<'a, 'e> SemanticRouter<'a, 'e> {
    /// Score queries against `vectors`, embedding them with `generator`.
    pub fn new(vectors: &'a CategoryVectors, generator: &'a EmbeddingGenerator<'e>) -> Self {
        Self { vectors, generator }
    }
}

#[async_trait]
impl CategoryScorer for SemanticRouter<'_, '_> {
    async fn score(&self, query: &str) -> Result<Option<(Category, f32)>, RouteragError> {
        if self.vectors.is_empty() {
            return Ok(None);
        }
        let query_vector = self.generator.embed_one(query).await?;
        let best = self.vectors.best_match(&query_vector)?;
        if let Some((category, score)) = best {
            debug!(%category, score, "semantic route");
        }
        Ok(best)
    }
}
