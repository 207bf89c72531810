//! Integration test: classify → embed → retrieve → prompt → complete, with
//! in-process fakes for both providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use routerag_answer::llm::Completer;
use routerag_answer::pipeline::AnswerPipeline;
use routerag_core::{Category, Chunk, Provenance, RouteragError, RouterConfig};
use routerag_index::embedding::Embedder;
use routerag_index::generator::EmbeddingGenerator;
use routerag_index::index::SimilarityIndex;
use routerag_router::{CategoryScorer, HybridClassifier, LexicalRouter};

const VOCAB: &[&str] = &["conflict", "teammates", "forecasting", "boosting", "statistics", "hobby"];

struct VocabEmbedder {
    calls: AtomicUsize,
}

impl VocabEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RouteragError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

struct FixedScorer(Category);

#[async_trait]
impl CategoryScorer for FixedScorer {
    async fn score(&self, _query: &str) -> Result<Option<(Category, f32)>, RouteragError> {
        Ok(Some((self.0, 0.3)))
    }
}

#[derive(Default)]
struct CannedCompleter {
    prompts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Completer for CannedCompleter {
    async fn complete(&self, system: &str, user: &str) -> Result<String, RouteragError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        Ok("canned answer".into())
    }
}

struct DownCompleter;

#[async_trait]
impl Completer for DownCompleter {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, RouteragError> {
        Err(RouteragError::Llm("503".into()))
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        Chunk::new("I resolved a conflict between two teammates over code review."),
        Chunk::new("The PM2.5 forecasting model used gradient boosting."),
        Chunk::new("B.Sc. in Statistics."),
    ]
}

async fn build_index(generator: &EmbeddingGenerator<'_>, chunks: &[Chunk]) -> SimilarityIndex {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    SimilarityIndex::build(generator.generate(&texts).await.unwrap())
}

#[tokio::test]
async fn answers_with_retrieved_context() {
    let embedder = VocabEmbedder::new();
    let generator = EmbeddingGenerator::new(&embedder, 2);
    let chunks = corpus();
    let index = build_index(&generator, &chunks).await;
    // Two batches for three chunks.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

    let scorer = FixedScorer(Category::Project);
    let classifier =
        HybridClassifier::new(LexicalRouter::from_config(&RouterConfig::default()), &scorer);
    let completer = CannedCompleter::default();
    let pipeline = AnswerPipeline::new(&classifier, &generator, &index, &chunks, &completer)
        .unwrap()
        .with_top_k(2);

    let answer = pipeline
        .answer("Tell me about a conflict with teammates")
        .await
        .unwrap();

    assert_eq!(answer.text, "canned answer");
    assert_eq!(answer.classification.category, Some(Category::Interview));
    assert_eq!(answer.classification.provenance, Provenance::Rule);
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0].row, 0);
    assert!((answer.sources[0].score - 1.0).abs() < 1e-5);
    // Rows 1 and 2 both score zero; the lower row wins the tie.
    assert_eq!(answer.sources[1].row, 1);

    let prompts = completer.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let (system, user) = &prompts[0];
    assert!(system.contains("Situation"));
    assert!(user.contains("[1] I resolved a conflict"));
    assert!(user.ends_with("Question: Tell me about a conflict with teammates\n"));
}

#[tokio::test]
async fn semantic_fallback_feeds_the_prompt() {
    let embedder = VocabEmbedder::new();
    let generator = EmbeddingGenerator::new(&embedder, 32);
    let chunks = corpus();
    let index = build_index(&generator, &chunks).await;

    let scorer = FixedScorer(Category::Resume);
    let classifier =
        HybridClassifier::new(LexicalRouter::from_config(&RouterConfig::default()), &scorer);
    let completer = CannedCompleter::default();
    let pipeline =
        AnswerPipeline::new(&classifier, &generator, &index, &chunks, &completer).unwrap();

    let answer = pipeline
        .answer("Describe your favorite hobby outside of work")
        .await
        .unwrap();
    assert_eq!(answer.classification.category, Some(Category::Resume));
    assert_eq!(answer.classification.provenance, Provenance::Semantic);
    assert_eq!(answer.sources.len(), 1);

    let prompts = completer.prompts.lock().unwrap();
    assert!(prompts[0].0.contains("background"));
}

#[tokio::test]
async fn mismatched_corpus_is_rejected() {
    let embedder = VocabEmbedder::new();
    let generator = EmbeddingGenerator::new(&embedder, 32);
    let chunks = corpus();
    let index = build_index(&generator, &chunks).await;

    let scorer = FixedScorer(Category::Resume);
    let classifier =
        HybridClassifier::new(LexicalRouter::from_config(&RouterConfig::default()), &scorer);
    let completer = CannedCompleter::default();
    let result = AnswerPipeline::new(&classifier, &generator, &index, &chunks[..2], &completer);
    assert!(matches!(result, Err(RouteragError::Index(_))));
}

#[tokio::test]
async fn zero_top_k_skips_retrieval() {
    let embedder = VocabEmbedder::new();
    let generator = EmbeddingGenerator::new(&embedder, 32);
    let chunks = corpus();
    let index = build_index(&generator, &chunks).await;
    let before = embedder.calls.load(Ordering::SeqCst);

    let scorer = FixedScorer(Category::Resume);
    let classifier =
        HybridClassifier::new(LexicalRouter::from_config(&RouterConfig::default()), &scorer);
    let completer = CannedCompleter::default();
    let pipeline = AnswerPipeline::new(&classifier, &generator, &index, &chunks, &completer)
        .unwrap()
        .with_top_k(0);

    let answer = pipeline.answer("What was your GPA?").await.unwrap();
    assert!(answer.sources.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), before);
    assert!(completer.prompts.lock().unwrap()[0].1.starts_with("No context"));
}

#[tokio::test]
async fn completion_failure_propagates() {
    let embedder = VocabEmbedder::new();
    let generator = EmbeddingGenerator::new(&embedder, 32);
    let chunks = corpus();
    let index = build_index(&generator, &chunks).await;

    let scorer = FixedScorer(Category::Resume);
    let classifier =
        HybridClassifier::new(LexicalRouter::from_config(&RouterConfig::default()), &scorer);
    let pipeline =
        AnswerPipeline::new(&classifier, &generator, &index, &chunks, &DownCompleter).unwrap();

    let err = pipeline.answer("What was your GPA?").await.unwrap_err();
    assert!(matches!(err, RouteragError::Llm(_)));
}
