//! Core types, configuration, and error handling for routerag.
//!
//! This crate provides the shared foundation used by the other routerag crates:
//! - [`RouteragError`] — unified error type using `thiserror`
//! - [`RouteragConfig`] — configuration loaded from `.routerag.toml`
//! - Shared types: [`Chunk`], [`Category`], [`Provenance`],
//!   [`ClassificationResult`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CategoryDescription, EmbeddingConfig, KeywordRule, LlmConfig, PathsConfig, RetrievalConfig,
    RouteragConfig, RouterConfig, API_KEY_ENV,
};
pub use error::RouteragError;
pub use types::{Category, Chunk, ClassificationResult, OutputFormat, Provenance};

/// A convenience `Result` type for routerag operations.
pub type Result<T> = std::result::Result<T, RouteragError>;
