use routerag_core::{Category, ClassificationResult, KeywordRule, Provenance, RouterConfig};

/// Keyword router.
///
/// Rules are tried in the order given; the first rule with a keyword that
/// occurs as a substring of the lower-cased query wins. The reported
/// confidence is the configured flat constant, not a computed probability.
///
/// # Examples
///
/// ```
/// use routerag_core::{Category, Provenance, RouterConfig};
/// use routerag_router::LexicalRouter;
///
/// let router = LexicalRouter::from_config(&RouterConfig::default());
/// let result = router.route("What was your GPA?");
/// assert_eq!(result.category, Some(Category::Resume));
/// assert_eq!(result.confidence, 0.9);
/// assert_eq!(result.provenance, Provenance::Rule);
/// ```
#[derive(Debug, Clone)]
pub struct LexicalRouter {
    rules: Vec<KeywordRule>,
    confidence: f32,
}

impl LexicalRouter {
    /// Create a router from rules in priority order.
    ///
    /// Keywords are lower-cased; empty keywords are dropped since they would
    /// match every query.
    pub fn new(rules: Vec<KeywordRule>, confidence: f32) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| KeywordRule {
                category: rule.category,
                keywords: rule
                    .keywords
                    .into_iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules, confidence }
    }

    /// Create a router from the `[router]` config section.
    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.rules.clone(), config.rule_confidence)
    }

    /// Categories in the order they are checked.
    pub fn priority(&self) -> impl Iterator<Item = Category> + '_ {
        self.rules.iter().map(|r| r.category)
    }

    /// First matching category and the keyword that triggered it.
    pub fn find_match(&self, query: &str) -> Option<(Category, &str)> {
        let q = query.to_lowercase();
        self.rules.iter().find_map(|rule| {
            rule.keywords
                .iter()
                .find(|keyword| q.contains(keyword.as_str()))
                .map(|keyword| (rule.category, keyword.as_str()))
        })
    }

    /// Route `query`. No match yields `None` with confidence 0.
    pub fn route(&self, query: &str) -> ClassificationResult {
        match self.find_match(query) {
            Some((category, _)) => {
                ClassificationResult::matched(category, self.confidence, Provenance::Rule)
            }
            None => ClassificationResult::unmatched(Provenance::Rule),
        }
    }
}
