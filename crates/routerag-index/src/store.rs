//! SQLite persistence for the similarity index.
//!
//! The database holds a `metadata` key/value table and a `vectors` table
//! whose `row` column is the chunk position and whose `embedding` column is a
//! little-endian `f32` BLOB. A save replaces the previous contents entirely;
//! the index is write-once per build.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use routerag_core::RouteragError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::index::SimilarityIndex;
use crate::matrix::{element_count, f32_byte_len, EmbeddingMatrix};

/// Facts recorded alongside the vectors when an index is saved.
///
/// # Examples
///
/// ```
/// use routerag_index::store::IndexMetadata;
///
/// let meta = IndexMetadata {
///     rows: 120,
///     dimensions: 1536,
///     model: "text-embedding-3-small".into(),
///     corpus_sha256: "ab12".into(),
///     built_at: "2026-01-01T00:00:00Z".into(),
/// };
/// assert_eq!(meta.rows, 120);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    /// Number of indexed vectors.
    pub rows: usize,
    /// Vector dimension.
    pub dimensions: usize,
    /// Embedding model the vectors came from.
    pub model: String,
    /// Fingerprint of the chunk corpus the index was built from.
    pub corpus_sha256: String,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

impl IndexMetadata {
    /// Check that this index belongs to a corpus with `rows` chunks and the
    /// given fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Index`] if either disagrees.
    pub fn ensure_matches(&self, rows: usize, corpus_sha256: &str) -> Result<(), RouteragError> {
        if self.rows != rows {
            return Err(RouteragError::Index(format!(
                "index has {} rows but the corpus has {rows} chunks",
                self.rows
            )));
        }
        if self.corpus_sha256 != corpus_sha256 {
            return Err(RouteragError::Index(
                "index was built from a different chunk corpus".into(),
            ));
        }
        Ok(())
    }
}

/// SQLite-backed storage for a [`SimilarityIndex`].
///
/// # Examples
///
/// ```
/// use routerag_index::index::SimilarityIndex;
/// use routerag_index::matrix::EmbeddingMatrix;
/// use routerag_index::store::IndexStore;
///
/// let mut store = IndexStore::in_memory().unwrap();
/// let m = EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
/// store.save(&SimilarityIndex::build(m), "model", "sha").unwrap();
/// let (index, meta) = store.load().unwrap();
/// assert_eq!(index.len(), 1);
/// assert_eq!(meta.dimensions, 2);
/// ```
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open or create an index database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Database`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, RouteragError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RouteragError::Database(format!("failed to create index directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| RouteragError::Database(format!("failed to open database: {e}")))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an index database that must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::FileNotFound`] if `path` does not exist.
    pub fn open_existing(path: &Path) -> Result<Self, RouteragError> {
        if !path.exists() {
            return Err(RouteragError::FileNotFound(path.to_path_buf()));
        }
        Self::open(path)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self, RouteragError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            RouteragError::Database(format!("failed to create in-memory database: {e}"))
        })?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), RouteragError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS metadata (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS vectors (
                    row INTEGER PRIMARY KEY,
                    embedding BLOB NOT NULL
                );
                ",
            )
            .map_err(|e| RouteragError::Database(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Replace the stored index with `index`.
    ///
    /// Runs in one transaction, so a failed save leaves the previous index
    /// intact.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Database`] on any SQLite failure.
    pub fn save(
        &mut self,
        index: &SimilarityIndex,
        model: &str,
        corpus_sha256: &str,
    ) -> Result<IndexMetadata, RouteragError> {
        let metadata = IndexMetadata {
            rows: index.len(),
            dimensions: index.dimensions(),
            model: model.to_string(),
            corpus_sha256: corpus_sha256.to_string(),
            built_at: Utc::now().to_rfc3339(),
        };

        let tx = self
            .conn
            .transaction()
            .map_err(|e| RouteragError::Database(format!("failed to begin transaction: {e}")))?;

        tx.execute_batch("DELETE FROM vectors; DELETE FROM metadata;")
            .map_err(|e| RouteragError::Database(format!("failed to clear index: {e}")))?;

        {
            let mut stmt = tx
                .prepare("INSERT INTO vectors (row, embedding) VALUES (?1, ?2)")
                .map_err(|e| RouteragError::Database(format!("failed to prepare insert: {e}")))?;
            for (row, vector) in index.vectors().rows().enumerate() {
                stmt.execute(params![row as i64, floats_to_bytes(vector)])
                    .map_err(|e| {
                        RouteragError::Database(format!("failed to insert row {row}: {e}"))
                    })?;
            }

            let mut meta = tx
                .prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")
                .map_err(|e| RouteragError::Database(format!("failed to prepare insert: {e}")))?;
            for (key, value) in [
                ("rows", metadata.rows.to_string()),
                ("dimensions", metadata.dimensions.to_string()),
                ("model", metadata.model.clone()),
                ("corpus_sha256", metadata.corpus_sha256.clone()),
                ("built_at", metadata.built_at.clone()),
            ] {
                meta.execute(params![key, value]).map_err(|e| {
                    RouteragError::Database(format!("failed to set metadata '{key}': {e}"))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| RouteragError::Database(format!("failed to commit index: {e}")))?;

        info!(
            rows = metadata.rows,
            dimensions = metadata.dimensions,
            "saved similarity index"
        );
        Ok(metadata)
    }

    /// Read the stored metadata, or `None` if nothing has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Database`] on query failure, or
    /// [`RouteragError::Index`] if a numeric field is corrupted.
    pub fn metadata(&self) -> Result<Option<IndexMetadata>, RouteragError> {
        let Some(rows) = self.get_metadata("rows")? else {
            return Ok(None);
        };
        let dimensions = self.get_metadata("dimensions")?.unwrap_or_default();

        Ok(Some(IndexMetadata {
            rows: parse_count("rows", &rows)?,
            dimensions: parse_count("dimensions", &dimensions)?,
            model: self.get_metadata("model")?.unwrap_or_default(),
            corpus_sha256: self.get_metadata("corpus_sha256")?.unwrap_or_default(),
            built_at: self.get_metadata("built_at")?.unwrap_or_default(),
        }))
    }

    /// Rebuild the in-memory index from the database.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Index`] if no index was saved, rows are
    /// missing or out of order, or a BLOB has the wrong length.
    pub fn load(&self) -> Result<(SimilarityIndex, IndexMetadata), RouteragError> {
        let metadata = self
            .metadata()?
            .ok_or_else(|| RouteragError::Index("database contains no saved index".into()))?;

        let mut stmt = self
            .conn
            .prepare("SELECT row, embedding FROM vectors ORDER BY row")
            .map_err(|e| RouteragError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
            .map_err(|e| RouteragError::Database(format!("failed to query vectors: {e}")))?;

        element_count(metadata.rows, metadata.dimensions)?;
        let row_bytes = f32_byte_len(metadata.dimensions)?;

        let mut data = Vec::new();
        let mut count = 0usize;
        for row in rows {
            let (position, bytes) =
                row.map_err(|e| RouteragError::Database(format!("failed to read row: {e}")))?;
            if position != count as i64 {
                return Err(RouteragError::Index(format!(
                    "vector rows are not contiguous: expected row {count}, found {position}"
                )));
            }
            if bytes.len() != row_bytes {
                return Err(RouteragError::Index(format!(
                    "row {position} has {} bytes, expected {row_bytes}",
                    bytes.len(),
                )));
            }
            data.extend(bytes_to_floats(&bytes));
            count += 1;
        }

        if count != metadata.rows {
            return Err(RouteragError::Index(format!(
                "metadata records {} rows but {count} are stored",
                metadata.rows
            )));
        }

        let matrix = EmbeddingMatrix::from_flat(data, metadata.rows, metadata.dimensions)?;
        debug!(rows = metadata.rows, "loaded similarity index");
        Ok((SimilarityIndex::build(matrix), metadata))
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>, RouteragError> {
        self.conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RouteragError::Database(format!("failed to get metadata '{key}': {e}")))
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, RouteragError> {
    value
        .parse()
        .map_err(|_| RouteragError::Index(format!("corrupted '{key}' metadata in index: '{value}'")))
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
