use std::fmt;

use routerag_core::{Chunk, ClassificationResult, RouteragError};
use routerag_index::generator::EmbeddingGenerator;
use routerag_index::index::SimilarityIndex;
use routerag_router::HybridClassifier;
use serde::Serialize;
use tracing::{debug, info};

use crate::llm::Completer;
use crate::prompt::{self, RetrievedChunk};

/// Result of answering one query.
///
/// # Examples
///
/// ```
/// use routerag_answer::pipeline::Answer;
/// use routerag_core::{ClassificationResult, Provenance};
///
/// let answer = Answer {
///     text: "I studied statistics.".into(),
///     classification: ClassificationResult::unmatched(Provenance::Semantic),
///     sources: vec![],
/// };
/// assert!(answer.sources.is_empty());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Text returned by the completion provider.
    pub text: String,
    /// How the query was routed.
    pub classification: ClassificationResult,
    /// Retrieved context, best first.
    pub sources: Vec<RetrievedChunk>,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Classify, retrieve, prompt, complete.
///
/// Borrows its classifier, generator, index, corpus and completer.
pub struct AnswerPipeline<'a> {
    classifier: &'a HybridClassifier<'a>,
    generator: &'a EmbeddingGenerator<'a>,
    index: &'a SimilarityIndex,
    chunks: &'a [Chunk],
    completer: &'a dyn Completer,
    top_k: usize,
}

impl<'a> AnswerPipeline<'a> {
    /// Create a pipeline retrieving one chunk per query.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Index`] if `index` and `chunks` disagree in
    /// length.
    pub fn new(
        classifier: &'a HybridClassifier<'a>,
        generator: &'a EmbeddingGenerator<'a>,
        index: &'a SimilarityIndex,
        chunks: &'a [Chunk],
        completer: &'a dyn Completer,
    ) -> Result<Self, RouteragError> {
        if index.len() != chunks.len() {
            return Err(RouteragError::Index(format!(
                "index has {} rows but the corpus has {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            classifier,
            generator,
            index,
            chunks,
            completer,
            top_k: 1,
        })
    }

    /// Retrieve up to `top_k` chunks per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Closest chunks to `query`, best first.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures and query/index dimension mismatches.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RouteragError> {
        if self.index.is_empty() || self.top_k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.generator.embed_one(query).await?;
        let hits = self.index.query(&vector, self.top_k)?;
        hits.into_iter()
            .map(|hit| {
                self.chunks
                    .get(hit.row)
                    .cloned()
                    .map(|chunk| RetrievedChunk {
                        row: hit.row,
                        score: hit.score,
                        chunk,
                    })
                    .ok_or_else(|| {
                        RouteragError::Index(format!("hit row {} has no chunk", hit.row))
                    })
            })
            .collect()
    }

    /// Answer `query`.
    ///
    /// # Errors
    ///
    /// Returns the first failure among classification, retrieval and
    /// completion.
    pub async fn answer(&self, query: &str) -> Result<Answer, RouteragError> {
        let classification = self.classifier.classify(query).await?;
        let sources = self.retrieve(query).await?;
        debug!(
            retrieved = sources.len(),
            top_row = ?sources.first().map(|s| s.row),
            "retrieved context"
        );

        let prompt = prompt::build_messages(query, &classification, &sources);
        let text = self.completer.complete(&prompt.system, &prompt.user).await?;
        info!(chars = text.len(), "answer generated");

        Ok(Answer {
            text,
            classification,
            sources,
        })
    }
}
