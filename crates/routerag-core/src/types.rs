use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A unit of source text, identified by its position in the corpus.
///
/// Only `content` is interpreted; any other fields in the source record are
/// kept in `metadata` and written back untouched.
///
/// # Examples
///
/// ```
/// use routerag_core::Chunk;
///
/// let chunk: Chunk = serde_json::from_str(r#"{"content": "B.Sc. in statistics", "source": "cv.pdf"}"#).unwrap();
/// assert_eq!(chunk.content, "B.Sc. in statistics");
/// assert_eq!(chunk.metadata["source"], "cv.pdf");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text that gets embedded and retrieved.
    pub content: String,
    /// Opaque extra fields from the source record.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Chunk {
    /// Create a chunk with no extra metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Topical category a query is routed to.
///
/// The set is closed; declaration order here is only used for display and
/// for [`Category::ALL`]. Routing priority comes from configuration.
///
/// # Examples
///
/// ```
/// use routerag_core::Category;
///
/// let c: Category = "resume".parse().unwrap();
/// assert_eq!(c, Category::Resume);
/// assert_eq!(c.to_string(), "resume");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Behavioural interview questions.
    Interview,
    /// Technical project details.
    Project,
    /// Education, experience and skills.
    Resume,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 3] = [Category::Interview, Category::Project, Category::Resume];

    /// Lowercase label used in config files and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Interview => "interview",
            Category::Project => "project",
            Category::Resume => "resume",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interview" => Ok(Category::Interview),
            "project" => Ok(Category::Project),
            "resume" => Ok(Category::Resume),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Which routing stage produced a classification.
///
/// # Examples
///
/// ```
/// use routerag_core::Provenance;
///
/// assert_eq!(serde_json::to_string(&Provenance::Rule).unwrap(), "\"rule\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Keyword match.
    Rule,
    /// Embedding similarity against category descriptions.
    Semantic,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Rule => write!(f, "rule"),
            Provenance::Semantic => write!(f, "semantic"),
        }
    }
}

/// Outcome of routing a query.
///
/// `confidence` is on different scales depending on `provenance`: the rule
/// stage reports a flat policy constant, the semantic stage reports the raw
/// inner product, which may be negative. Do not compare them directly.
///
/// # Examples
///
/// ```
/// use routerag_core::{Category, ClassificationResult, Provenance};
///
/// let result = ClassificationResult::matched(Category::Interview, 0.9, Provenance::Rule);
/// assert_eq!(result.category, Some(Category::Interview));
///
/// let none = ClassificationResult::unmatched(Provenance::Semantic);
/// assert!(none.category.is_none());
/// assert_eq!(none.confidence, 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Chosen category, `None` when no stage produced one.
    pub category: Option<Category>,
    /// Stage-specific score.
    pub confidence: f32,
    /// Stage that decided.
    pub provenance: Provenance,
}

impl ClassificationResult {
    /// A decision for `category`.
    pub fn matched(category: Category, confidence: f32, provenance: Provenance) -> Self {
        Self {
            category: Some(category),
            confidence,
            provenance,
        }
    }

    /// No category, zero confidence.
    pub fn unmatched(provenance: Provenance) -> Self {
        Self {
            category: None,
            confidence: 0.0,
            provenance,
        }
    }

    /// Whether a category was chosen.
    pub fn is_match(&self) -> bool {
        self.category.is_some()
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use routerag_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("hobby".parse::<Category>().is_err());
    }

    #[test]
    fn chunk_keeps_unknown_fields() {
        let json = r#"{"content": "text", "id": 7, "section": "education"}"#;
        let chunk: Chunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.metadata.len(), 2);

        let back = serde_json::to_value(&chunk).unwrap();
        assert_eq!(back["id"], 7);
        assert_eq!(back["content"], "text");
    }

    #[test]
    fn chunk_without_content_is_rejected() {
        let result: Result<Chunk, _> = serde_json::from_str(r#"{"text": "oops"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn classification_serializes_camel_case() {
        let result = ClassificationResult::matched(Category::Project, 0.42, Provenance::Semantic);
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["category"], "project");
        assert_eq!(json["provenance"], "semantic");
        assert!(json["confidence"].as_f64().unwrap() > 0.41);
    }
}
