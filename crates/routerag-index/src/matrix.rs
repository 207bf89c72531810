//! Dense row-major embedding matrix and its `.npy` artifact.
//!
//! The artifact is a NumPy v1.0 file holding a C-ordered little-endian `f32`
//! array of shape `(N, D)`, row `i` being the vector of chunk `i`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use routerag_core::RouteragError;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGN: usize = 64;

/// Row-major `N x D` matrix of `f32`, one row per chunk.
///
/// Every row has the same dimension; an empty matrix has zero rows and
/// zero dimensions.
///
/// # Examples
///
/// ```
/// use routerag_index::matrix::EmbeddingMatrix;
///
/// let m = EmbeddingMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
/// assert_eq!(m.len(), 2);
/// assert_eq!(m.dimensions(), 2);
/// assert_eq!(m.row(1), &[0.0, 1.0]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    rows: usize,
    dimensions: usize,
}

impl EmbeddingMatrix {
    /// A matrix with no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from individual rows.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::DimensionMismatch`] if rows differ in length,
    /// or [`RouteragError::Index`] if the rows are zero-length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, RouteragError> {
        let Some(first) = rows.first() else {
            return Ok(Self::empty());
        };
        let dimensions = first.len();
        if dimensions == 0 {
            return Err(RouteragError::Index("embedding rows are empty".into()));
        }

        let mut data = Vec::with_capacity(rows.len() * dimensions);
        for row in &rows {
            if row.len() != dimensions {
                return Err(RouteragError::DimensionMismatch {
                    expected: dimensions,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            data,
            rows: rows.len(),
            dimensions,
        })
    }

    /// Build from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Index`] if `data.len() != rows * dimensions`,
    /// or if `rows > 0` with zero-length rows.
    pub fn from_flat(data: Vec<f32>, rows: usize, dimensions: usize) -> Result<Self, RouteragError> {
        if rows > 0 && dimensions == 0 {
            return Err(RouteragError::Index(format!(
                "{rows} rows of dimension zero"
            )));
        }
        if data.len() != element_count(rows, dimensions)? {
            return Err(RouteragError::Index(format!(
                "buffer holds {} values, expected {rows} x {dimensions}",
                data.len()
            )));
        }
        if rows == 0 {
            return Ok(Self::empty());
        }
        Ok(Self {
            data,
            rows,
            dimensions,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Dimension shared by all rows.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Row `i`. Panics if `i >= len()`, like slice indexing.
    pub fn row(&self, i: usize) -> &[f32] {
        let start = i * self.dimensions;
        &self.data[start..start + self.dimensions]
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics, and an empty matrix has no rows anyway.
        self.data.chunks_exact(self.dimensions.max(1))
    }

    /// Iterate rows mutably in order.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.data.chunks_exact_mut(self.dimensions.max(1))
    }

    /// Flat row-major view.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// `rows * dimensions`, or [`RouteragError::Index`] on overflow.
pub(crate) fn element_count(rows: usize, dimensions: usize) -> Result<usize, RouteragError> {
    rows.checked_mul(dimensions).ok_or_else(|| {
        RouteragError::Index(format!("shape ({rows}, {dimensions}) is too large"))
    })
}

/// Byte length of `count` little-endian `f32` values.
pub(crate) fn f32_byte_len(count: usize) -> Result<usize, RouteragError> {
    count
        .checked_mul(4)
        .ok_or_else(|| RouteragError::Index(format!("{count} values do not fit in memory")))
}

/// Write `matrix` as a NumPy v1.0 `.npy` file.
///
/// # Errors
///
/// Returns [`RouteragError::Io`] on write failure.
///
/// # Examples
///
/// ```
/// use routerag_index::matrix::{read_npy, write_npy, EmbeddingMatrix};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("embeddings.npy");
/// let m = EmbeddingMatrix::from_rows(vec![vec![0.6, 0.8]]).unwrap();
/// write_npy(&path, &m).unwrap();
/// assert_eq!(read_npy(&path).unwrap(), m);
/// ```
pub fn write_npy(path: &Path, matrix: &EmbeddingMatrix) -> Result<(), RouteragError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(&npy_header(matrix.len(), matrix.dimensions()))?;
    for value in matrix.as_slice() {
        out.write_all(&value.to_le_bytes())?;
    }
    out.flush()?;
    Ok(())
}

fn npy_header(rows: usize, dimensions: usize) -> Vec<u8> {
    let mut dict =
        format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {dimensions}), }}");
    // magic (6) + version (2) + header length (2) + dict + trailing newline
    let unpadded = NPY_MAGIC.len() + 4 + dict.len() + 1;
    let padding = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
    dict.push_str(&" ".repeat(padding));
    dict.push('\n');

    let mut header = Vec::with_capacity(NPY_MAGIC.len() + 4 + dict.len());
    header.extend_from_slice(NPY_MAGIC);
    header.extend_from_slice(&[1, 0]);
    header.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    header.extend_from_slice(dict.as_bytes());
    header
}

/// Read a `.npy` file written by [`write_npy`] (or by NumPy with the same layout).
///
/// Accepts format versions 1.0 and 2.0; only `'<f4'` C-ordered 2-D arrays.
///
/// # Errors
///
/// Returns [`RouteragError::FileNotFound`] if the file is missing, or
/// [`RouteragError::Index`] if the header or payload is not as expected.
pub fn read_npy(path: &Path) -> Result<EmbeddingMatrix, RouteragError> {
    if !path.exists() {
        return Err(RouteragError::FileNotFound(path.to_path_buf()));
    }
    let mut input = BufReader::new(File::open(path)?);

    let mut preamble = [0u8; 8];
    input
        .read_exact(&mut preamble)
        .map_err(|_| RouteragError::Index("file too short for an .npy header".into()))?;
    if &preamble[..6] != NPY_MAGIC {
        return Err(RouteragError::Index("missing .npy magic string".into()));
    }

    let header_len = match preamble[6] {
        1 => {
            let mut len = [0u8; 2];
            input.read_exact(&mut len)?;
            usize::from(u16::from_le_bytes(len))
        }
        2 => {
            let mut len = [0u8; 4];
            input.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        v => {
            return Err(RouteragError::Index(format!(
                "unsupported .npy format version {v}"
            )))
        }
    };

    let mut header = vec![0u8; header_len];
    input.read_exact(&mut header)?;
    let header = String::from_utf8(header)
        .map_err(|_| RouteragError::Index(".npy header is not valid text".into()))?;
    let (rows, dimensions) = parse_npy_header(&header)?;

    let expected = f32_byte_len(element_count(rows, dimensions)?)?;

    let mut payload = Vec::new();
    input.read_to_end(&mut payload)?;
    if payload.len() != expected {
        return Err(RouteragError::Index(format!(
            ".npy payload has {} bytes, expected {expected} for shape ({rows}, {dimensions})",
            payload.len(),
        )));
    }

    let data = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    EmbeddingMatrix::from_flat(data, rows, dimensions)
}

fn parse_npy_header(header: &str) -> Result<(usize, usize), RouteragError> {
    let descr = header_value(header, "descr")
        .ok_or_else(|| RouteragError::Index(".npy header has no descr".into()))?;
    if descr.trim_matches('\'') != "<f4" {
        return Err(RouteragError::Index(format!(
            "unsupported .npy dtype {descr}, expected '<f4'"
        )));
    }

    if header_value(header, "fortran_order") != Some("False") {
        return Err(RouteragError::Index(
            "Fortran-ordered .npy arrays are not supported".into(),
        ));
    }

    let shape = header_value(header, "shape")
        .ok_or_else(|| RouteragError::Index(".npy header has no shape".into()))?;
    let dims: Vec<usize> = shape
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| RouteragError::Index(format!("bad .npy shape entry '{s}'")))
        })
        .collect::<Result<_, _>>()?;

    match dims.as_slice() {
        [rows, dimensions] => Ok((*rows, *dimensions)),
        _ => Err(RouteragError::Index(format!(
            "expected a 2-D .npy array, got shape {shape}"
        ))),
    }
}

fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let start = header.find(&needle)? + needle.len();
    let rest = header[start..].trim_start();
    if rest.starts_with('(') {
        let end = rest.find(')')?;
        Some(&rest[..=end])
    } else {
        let end = rest.find([',', '}'])?;
        Some(rest[..end].trim())
    }
}
