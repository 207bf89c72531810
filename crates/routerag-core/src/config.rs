use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RouteragError;
use crate::types::Category;

/// Environment variable consulted when a provider section has no `api_key`.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration loaded from `.routerag.toml`.
///
/// CLI flags override the file, absent fields take their defaults, and
/// provider credentials fall back to `OPENAI_API_KEY`.
///
/// # Examples
///
/// ```
/// use routerag_core::RouteragConfig;
///
/// let config = RouteragConfig::default();
/// assert_eq!(config.embedding.batch_size, 32);
/// assert_eq!(config.router.rule_confidence, 0.9);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteragConfig {
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Completion provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Keyword rules and category descriptions.
    #[serde(default)]
    pub router: RouterConfig,
    /// Retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Artifact and output locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

impl RouteragConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Io`] if the file cannot be read,
    /// [`RouteragError::Toml`] if it is not valid TOML, or
    /// [`RouteragError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use routerag_core::RouteragConfig;
    /// use std::path::Path;
    ///
    /// let config = RouteragConfig::from_file(Path::new(".routerag.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, RouteragError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// Keywords are lower-cased so matching against a lower-cased query works
    /// regardless of how they were written.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Toml`] if parsing fails, or
    /// [`RouteragError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use routerag_core::RouteragConfig;
    ///
    /// let toml = r#"
    /// [embedding]
    /// batch_size = 8
    /// "#;
    /// let config = RouteragConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.embedding.batch_size, 8);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, RouteragError> {
        let mut config: Self = toml::from_str(content)?;
        for rule in &mut config.router.rules {
            for keyword in &mut rule.keywords {
                *keyword = keyword.to_lowercase();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), RouteragError> {
        if self.embedding.batch_size == 0 {
            return Err(RouteragError::Config(
                "embedding.batch_size must be at least 1".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(RouteragError::Config(
                "retrieval.top_k must be at least 1".into(),
            ));
        }
        self.router.validate()
    }
}

/// Embedding provider configuration.
///
/// # Examples
///
/// ```
/// use routerag_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.model, "text-embedding-3-small");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name, used for messages only.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// API key; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Custom base URL, e.g. a local OpenAI-compatible server.
    pub base_url: Option<String>,
    /// Texts per provider call (default: 32).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            api_key: None,
            base_url: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Completion provider configuration.
///
/// # Examples
///
/// ```
/// use routerag_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name, used for messages only.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// API key; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Sampling temperature (default: 0.2).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

/// Keyword triggers for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Category selected when any keyword matches.
    pub category: Category,
    /// Lowercase substrings to look for in the query.
    pub keywords: Vec<String>,
}

/// Natural-language description seeding a category's semantic vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescription {
    /// Category being described.
    pub category: Category,
    /// Text that gets embedded.
    pub description: String,
}

/// Routing configuration.
///
/// `rules` are checked in the order they are declared: a query matching
/// keywords of two categories goes to the one declared first. The defaults
/// declare `interview`, then `project`, then `resume`.
///
/// # Examples
///
/// ```
/// use routerag_core::{Category, RouterConfig};
///
/// let config = RouterConfig::default();
/// let order: Vec<Category> = config.rules.iter().map(|r| r.category).collect();
/// assert_eq!(order, vec![Category::Interview, Category::Project, Category::Resume]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Confidence reported for any keyword match (default: 0.9).
    #[serde(default = "default_rule_confidence")]
    pub rule_confidence: f32,
    /// Keyword rules in priority order.
    #[serde(default = "default_rules")]
    pub rules: Vec<KeywordRule>,
    /// Descriptions used by the semantic fallback, in tie-break order.
    #[serde(default = "default_descriptions")]
    pub descriptions: Vec<CategoryDescription>,
}

fn default_rule_confidence() -> f32 {
    0.9
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule {
            category: Category::Interview,
            keywords: keywords(&[
                "conflict",
                "failure",
                "strength",
                "weakness",
                "stress",
                "leadership",
                "team",
                "criticism",
            ]),
        },
        KeywordRule {
            category: Category::Project,
            keywords: keywords(&[
                "pm2.5",
                "kaggle",
                "model",
                "pipeline",
                "feature",
                "evaluation",
                "metric",
                "leakage",
            ]),
        },
        KeywordRule {
            category: Category::Resume,
            keywords: keywords(&[
                "education",
                "gpa",
                "experience",
                "skills",
                "background",
                "tool",
            ]),
        },
    ]
}

fn default_descriptions() -> Vec<CategoryDescription> {
    vec![
        CategoryDescription {
            category: Category::Interview,
            description:
                "behavioral interview questions about teamwork, conflict, leadership, failure"
                    .into(),
        },
        CategoryDescription {
            category: Category::Project,
            description:
                "technical machine learning project details, modeling, evaluation, time series"
                    .into(),
        },
        CategoryDescription {
            category: Category::Resume,
            description: "education background, work experience, skills, internships".into(),
        },
    ]
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rule_confidence: default_rule_confidence(),
            rules: default_rules(),
            descriptions: default_descriptions(),
        }
    }
}

impl RouterConfig {
    /// Check that the rule and description sets are usable.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Config`] for an empty description set, a
    /// category declared twice, or a confidence outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), RouteragError> {
        if !(0.0..=1.0).contains(&self.rule_confidence) {
            return Err(RouteragError::Config(format!(
                "router.rule_confidence must be within [0, 1], got {}",
                self.rule_confidence
            )));
        }
        if self.descriptions.is_empty() {
            return Err(RouteragError::Config(
                "router.descriptions must declare at least one category".into(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.category) {
                return Err(RouteragError::Config(format!(
                    "category '{}' has more than one keyword rule",
                    rule.category
                )));
            }
        }

        let mut seen = HashSet::new();
        for desc in &self.descriptions {
            if !seen.insert(desc.category) {
                return Err(RouteragError::Config(format!(
                    "category '{}' has more than one description",
                    desc.category
                )));
            }
        }

        Ok(())
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks passed to the answer prompt (default: 1).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    1
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Locations of inputs, build artifacts and the answer transcript.
///
/// # Examples
///
/// ```
/// use routerag_core::PathsConfig;
///
/// let paths = PathsConfig::default();
/// assert_eq!(paths.chunks.to_str(), Some("chunks.json"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON array of chunk records.
    #[serde(default = "default_chunks_path")]
    pub chunks: PathBuf,
    /// Embedding matrix artifact (`.npy`).
    #[serde(default = "default_embeddings_path")]
    pub embeddings: PathBuf,
    /// Similarity index artifact (SQLite).
    #[serde(default = "default_index_path")]
    pub index: PathBuf,
    /// Where `ask` writes the query and answer.
    #[serde(default = "default_answer_path")]
    pub answer_output: PathBuf,
}

fn default_chunks_path() -> PathBuf {
    PathBuf::from("chunks.json")
}

fn default_embeddings_path() -> PathBuf {
    PathBuf::from("embeddings.npy")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("index.db")
}

fn default_answer_path() -> PathBuf {
    PathBuf::from("rag_answer.txt")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            chunks: default_chunks_path(),
            embeddings: default_embeddings_path(),
            index: default_index_path(),
            answer_output: default_answer_path(),
        }
    }
}
