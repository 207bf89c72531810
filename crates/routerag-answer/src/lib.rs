//! Retrieval-augmented answering.
//!
//! Takes a classified query, retrieves the closest chunks from the
//! similarity index, assembles a category-specific prompt and asks a chat
//! completion provider for the answer.
//!
//! - [`llm`] — completion seam and OpenAI-compatible chat client
//! - [`prompt`] — prompt assembly
//! - [`pipeline`] — the end-to-end answer flow

pub mod llm;
pub mod pipeline;
pub mod prompt;
