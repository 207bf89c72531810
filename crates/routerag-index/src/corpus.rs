//! Loading the chunk corpus and fingerprinting it.

use std::path::Path;

use routerag_core::{Chunk, RouteragError};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Read a JSON array of chunk records.
///
/// Order is preserved: record `i` becomes chunk `i` and, after a build,
/// index row `i`.
///
/// # Errors
///
/// Returns [`RouteragError::FileNotFound`] if `path` does not exist, or
/// [`RouteragError::Serialization`] if it is not an array of objects with a
/// string `content` field.
///
/// # Examples
///
/// ```
/// use routerag_index::corpus::load_chunks;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("chunks.json");
/// std::fs::write(&path, r#"[{"content": "first"}, {"content": "second"}]"#).unwrap();
/// let chunks = load_chunks(&path).unwrap();
/// assert_eq!(chunks[1].content, "second");
/// ```
pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>, RouteragError> {
    if !path.exists() {
        return Err(RouteragError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let chunks: Vec<Chunk> = serde_json::from_str(&content)?;
    debug!(path = %path.display(), chunks = chunks.len(), "loaded chunks");
    Ok(chunks)
}

/// The texts to embed, in corpus order.
pub fn chunk_texts(chunks: &[Chunk]) -> Vec<String> {
    chunks.iter().map(|c| c.content.clone()).collect()
}

/// SHA-256 over the ordered chunk contents.
///
/// Each content is length-prefixed so that moving text across a chunk
/// boundary changes the fingerprint. Used to detect an index built from a
/// different corpus.
///
/// # Examples
///
/// ```
/// use routerag_core::Chunk;
/// use routerag_index::corpus::corpus_fingerprint;
///
/// let a = vec![Chunk::new("ab"), Chunk::new("c")];
/// let b = vec![Chunk::new("a"), Chunk::new("bc")];
/// assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
/// ```
pub fn corpus_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update((chunk.content.len() as u64).to_le_bytes());
        hasher.update(chunk.content.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
