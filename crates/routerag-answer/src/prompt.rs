use std::fmt::Write as _;

use routerag_core::{Category, Chunk, ClassificationResult};
use serde::Serialize;

const INTERVIEW_PROMPT: &str = "\
You are answering a behavioral interview question on behalf of the candidate \
whose documents are provided as context.

Rules:
- Answer in the first person, as the candidate
- Structure the answer as Situation, Task, Action, Result
- Use only experiences that appear in the context
- Keep it to a few short paragraphs";

const PROJECT_PROMPT: &str = "\
You are explaining one of the candidate's technical projects, using the \
provided context as the only source of facts.

Rules:
- Be concrete about data, features, models, evaluation and results
- Name metrics and numbers exactly as they appear in the context
- Do not invent techniques or results that are not in the context";

const RESUME_PROMPT: &str = "\
You are answering a factual question about the candidate's background: \
education, work experience, skills and tools.

Rules:
- Answer briefly and factually
- Use only facts that appear in the context
- If the context does not contain the answer, say so";

const GENERAL_PROMPT: &str = "\
You are a helpful assistant answering questions about a candidate using the \
provided context.

Rules:
- Use only facts that appear in the context
- If the context does not contain the answer, say so";

/// A chunk selected by the similarity index for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    /// Row in the index (== position in the corpus).
    pub row: usize,
    /// Inner product with the query vector.
    pub score: f32,
    /// The chunk itself.
    pub chunk: Chunk,
}

/// The system and user message sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Category instructions.
    pub system: String,
    /// Numbered context followed by the question.
    pub user: String,
}

/// System instructions for a category; `None` gets the general prompt.
///
/// # Examples
///
/// ```
/// use routerag_answer::prompt::system_prompt;
/// use routerag_core::Category;
///
/// assert!(system_prompt(Some(Category::Interview)).contains("Situation"));
/// assert!(system_prompt(None).contains("helpful assistant"));
/// ```
pub fn system_prompt(category: Option<Category>) -> &'static str {
    match category {
        Some(Category::Interview) => INTERVIEW_PROMPT,
        Some(Category::Project) => PROJECT_PROMPT,
        Some(Category::Resume) => RESUME_PROMPT,
        None => GENERAL_PROMPT,
    }
}

/// User message: numbered context chunks followed by the question.
pub fn build_user_prompt(query: &str, context: &[RetrievedChunk]) -> String {
    let mut prompt = String::new();
    if context.is_empty() {
        prompt.push_str("No context was retrieved for this question.\n");
    } else {
        prompt.push_str("Context:\n");
        for (i, retrieved) in context.iter().enumerate() {
            let _ = write!(prompt, "\n[{}] {}\n", i + 1, retrieved.chunk.content.trim());
        }
    }
    let _ = write!(prompt, "\nQuestion: {query}\n");
    prompt
}

/// Assemble the prompt for `query` given its classification and context.
///
/// # Examples
///
/// ```
/// use routerag_answer::prompt::{build_messages, RetrievedChunk};
/// use routerag_core::{Category, Chunk, ClassificationResult, Provenance};
///
/// let classification = ClassificationResult::matched(Category::Resume, 0.9, Provenance::Rule);
/// let context = vec![RetrievedChunk { row: 0, score: 0.8, chunk: Chunk::new("GPA 3.9") }];
/// let prompt = build_messages("What was your GPA?", &classification, &context);
/// assert!(prompt.system.contains("background"));
/// assert!(prompt.user.contains("[1] GPA 3.9"));
/// assert!(prompt.user.ends_with("Question: What was your GPA?\n"));
/// ```
pub fn build_messages(
    query: &str,
    classification: &ClassificationResult,
    context: &[RetrievedChunk],
) -> Prompt {
    Prompt {
        system: system_prompt(classification.category).to_string(),
        user: build_user_prompt(query, context),
    }
}
