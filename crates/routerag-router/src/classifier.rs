//! Two-stage hybrid classification.

use routerag_core::{ClassificationResult, Provenance, RouteragError};
use tracing::{debug, info};

use crate::lexical::LexicalRouter;
use crate::semantic::CategoryScorer;

/// Keyword rules first, similarity fallback second.
///
/// A rule match is returned immediately and the scorer is never consulted,
/// so a matched query costs no embedding call. Otherwise the scorer's best
/// category is returned with [`Provenance::Semantic`].
pub struct HybridClassifier<'s> {
    lexical: LexicalRouter,
    semantic: &'s dyn CategoryScorer,
}

impl<'s> HybridClassifier<'s> {
    /// Combine a rule router with a similarity scorer.
    pub fn new(lexical: LexicalRouter, semantic: &'s dyn CategoryScorer) -> Self {
        Self { lexical, semantic }
    }

    /// Classify `query`.
    ///
    /// # Errors
    ///
    /// Only the semantic stage can fail, with whatever error the scorer
    /// returns (typically an embedding failure).
    pub async fn classify(&self, query: &str) -> Result<ClassificationResult, RouteragError> {
        let result = self.lexical.route(query);
        if result.is_match() {
            info!(
                category = ?result.category,
                provenance = "rule",
                confidence = result.confidence,
                "classified query"
            );
            return Ok(result);
        }

        debug!("no keyword matched, falling back to semantic routing");
        let result = match self.semantic.score(query).await? {
            Some((category, score)) => {
                ClassificationResult::matched(category, score, Provenance::Semantic)
            }
            None => ClassificationResult::unmatched(Provenance::Semantic),
        };
        info!(
            category = ?result.category,
            provenance = "semantic",
            confidence = result.confidence,
            "classified query"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use routerag_core::{Category, RouterConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingScorer {
        answer: Option<(Category, f32)>,
        calls: AtomicUsize,
    }

    impl CountingScorer {
        fn new(answer: Option<(Category, f32)>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CategoryScorer for CountingScorer {
        async fn score(&self, _query: &str) -> Result<Option<(Category, f32)>, RouteragError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    struct BrokenScorer;

    #[async_trait]
    impl CategoryScorer for BrokenScorer {
        async fn score(&self, _query: &str) -> Result<Option<(Category, f32)>, RouteragError> {
            Err(RouteragError::Embedding("provider down".into()))
        }
    }

    fn lexical() -> LexicalRouter {
        LexicalRouter::from_config(&RouterConfig::default())
    }

    #[tokio::test]
    async fn rule_match_skips_scorer() {
        let scorer = CountingScorer::new(Some((Category::Project, 0.4)));
        let classifier = HybridClassifier::new(lexical(), &scorer);

        let result = classifier
            .classify("Tell me about a time you had a conflict with a teammate")
            .await
            .unwrap();
        assert_eq!(result.category, Some(Category::Interview));
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.provenance, Provenance::Rule);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_rule_falls_back_to_scorer() {
        let scorer = CountingScorer::new(Some((Category::Resume, 0.42)));
        let classifier = HybridClassifier::new(lexical(), &scorer);

        let result = classifier
            .classify("Describe your favorite hobby outside of work")
            .await
            .unwrap();
        assert_eq!(result.category, Some(Category::Resume));
        assert_eq!(result.confidence, 0.42);
        assert_eq!(result.provenance, Provenance::Semantic);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_scorer_yields_unmatched_semantic() {
        let scorer = CountingScorer::new(None);
        let classifier = HybridClassifier::new(lexical(), &scorer);

        let result = classifier.classify("hello there").await.unwrap();
        assert_eq!(result.category, None);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.provenance, Provenance::Semantic);
    }

    #[tokio::test]
    async fn scorer_failure_propagates() {
        let classifier = HybridClassifier::new(lexical(), &BrokenScorer);
        let err = classifier.classify("hello there").await.unwrap_err();
        assert!(matches!(err, RouteragError::Embedding(_)));
    }

    #[tokio::test]
    async fn rule_match_never_touches_broken_scorer() {
        let classifier = HybridClassifier::new(lexical(), &BrokenScorer);
        let result = classifier.classify("What was your GPA?").await.unwrap();
        assert_eq!(result.category, Some(Category::Resume));
    }
}
