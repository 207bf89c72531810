//! Query classification: keyword rules first, embedding similarity second.
//!
//! A query is lower-cased and checked against each category's keywords in
//! declared priority order. Only when no keyword matches is the query
//! embedded and compared with precomputed category-description vectors.
//!
//! - [`lexical`] — keyword router
//! - [`semantic`] — category vectors and similarity router
//! - [`classifier`] — the two-stage hybrid classifier

pub mod classifier;
pub mod lexical;
pub mod semantic;

pub use classifier::HybridClassifier;
pub use lexical::LexicalRouter;
pub use semantic::{CategoryScorer, CategoryVectors, SemanticRouter};
