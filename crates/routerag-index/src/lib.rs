//! Embedding generation and exact vector retrieval.
//!
//! Offline, chunk texts are embedded in fixed-size batches, normalized to
//! unit length and stored as a similarity index; online, a normalized query
//! vector is scored against every row by inner product.
//!
//! - [`embedding`] — provider seam and OpenAI-compatible client
//! - [`generator`] — batched, order-preserving embedding generation
//! - [`normalize`] — L2 normalization and the zero-vector policy
//! - [`matrix`] — embedding matrix and its `.npy` artifact
//! - [`index`] — brute-force inner-product search
//! - [`store`] — SQLite persistence for the index
//! - [`corpus`] — chunk loading and corpus fingerprinting

pub mod corpus;
pub mod embedding;
pub mod generator;
pub mod index;
pub mod matrix;
pub mod normalize;
pub mod store;
