//! Persisted case index
//!
//! An index directory holds three co-located artifacts:
//!
//! ```text
//! index/
//! ├─ cases.jsonl     one IndexRecord per line, loader order
//! ├─ embeddings.npy  float32 matrix, row i ↔ line i
//! └─ meta.json       {"model", "count", "dimensions"}
//! ```
//!
//! Row/record alignment is checked eagerly on load; a mismatch is never
//! discovered at query time.

use crate::embeddings::ensure_unit_vector;
use crate::error::{Error, Result};
use crate::npy;
use casebook_cases::case::lenient;
use casebook_cases::{project, Case};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Case records artifact
pub const CASES_FILE: &str = "cases.jsonl";
/// Embedding matrix artifact
pub const EMBEDDINGS_FILE: &str = "embeddings.npy";
/// Build metadata artifact
pub const META_FILE: &str = "meta.json";
/// Command that produces an index
pub const BUILD_COMMAND: &str = "casebook build";

/// One indexed case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Case identifier
    pub id: String,
    /// Case title
    pub title: Option<String>,
    /// Owning team
    pub owner_team: Option<String>,
    /// Severity as authored
    pub severity: Option<Value>,
    /// Origin tags
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub origin: Vec<String>,
    /// Layer tags
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub layer: Vec<String>,
    /// Full case
    pub payload: Case,
    /// Text the embedding was computed from
    pub embedding_text: String,
}

impl IndexRecord {
    /// Build a record from a case, projecting its embedding text
    pub fn from_case(case: Case) -> Self {
        let embedding_text = project(&case);
        Self {
            id: case.id.clone(),
            title: case.title.clone(),
            owner_team: case.owner_team.clone(),
            severity: case.severity.clone(),
            origin: case.origin.clone(),
            layer: case.layer.clone(),
            payload: case,
            embedding_text,
        }
    }
}

/// Build metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Embedding model identifier
    pub model: String,
    /// Number of indexed cases
    pub count: usize,
    /// Embedding dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

/// Row-major embedding matrix
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows: usize,
    dimensions: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Build from per-row vectors; every row must share one non-zero dimension
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dimensions = rows.first().map(Vec::len).unwrap_or(0);
        if !rows.is_empty() && dimensions == 0 {
            return Err(Error::Embedding("provider returned empty vectors".to_string()));
        }

        let mut data = Vec::with_capacity(rows.len() * dimensions);
        for row in &rows {
            if row.len() != dimensions {
                return Err(Error::DimensionMismatch {
                    expected: dimensions,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            rows: rows.len(),
            dimensions,
            data,
        })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Row width
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Row `i`
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dimensions..(i + 1) * self.dimensions]
    }

    /// Iterate rows in order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    fn write_npy(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        npy::write_f32_matrix(&mut writer, self.rows, self.dimensions, &self.data)?;
        writer.flush()?;
        Ok(())
    }

    fn read_npy(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let (header, data) = npy::read_f32_array(&mut reader)?;
        if header.shape.len() != 2 {
            return Err(Error::IndexCorrupt(format!(
                "{} must be two-dimensional, ndim={}",
                EMBEDDINGS_FILE,
                header.shape.len()
            )));
        }
        Ok(Self {
            rows: header.shape[0],
            dimensions: header.shape[1],
            data,
        })
    }
}

/// Loaded case index: records aligned with their embedding rows
#[derive(Debug, Clone)]
pub struct Index {
    records: Vec<IndexRecord>,
    embeddings: EmbeddingMatrix,
    model: Option<String>,
}

impl Index {
    /// Assemble an index, checking row/record alignment
    pub fn new(
        records: Vec<IndexRecord>,
        embeddings: EmbeddingMatrix,
        model: Option<String>,
    ) -> Result<Self> {
        if records.len() != embeddings.rows() {
            return Err(Error::IndexCorrupt(format!(
                "{} has {} records but {} has {} rows",
                CASES_FILE,
                records.len(),
                EMBEDDINGS_FILE,
                embeddings.rows()
            )));
        }
        Ok(Self {
            records,
            embeddings,
            model,
        })
    }

    /// Records in index order
    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    /// Embedding matrix, row-aligned with [`Index::records`]
    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    /// Model recorded at build time, if metadata was present
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Embedding dimension
    pub fn dimensions(&self) -> usize {
        self.embeddings.dimensions()
    }

    /// Number of indexed cases
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no cases
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build metadata for this index
    pub fn meta(&self) -> IndexMeta {
        IndexMeta {
            model: self.model.clone().unwrap_or_default(),
            count: self.len(),
            dimensions: Some(self.dimensions()),
        }
    }

    /// Whether both required artifacts exist in `dir`
    pub fn exists(dir: &Path) -> bool {
        dir.join(CASES_FILE).is_file() && dir.join(EMBEDDINGS_FILE).is_file()
    }

    /// Load an index directory.
    ///
    /// # Errors
    ///
    /// - [`Error::IndexNotFound`] when `cases.jsonl` or `embeddings.npy` is absent
    /// - [`Error::IndexCorrupt`] when the matrix is not 2-D, rows and records
    ///   disagree, metadata disagrees, or a stored vector is not unit length
    #[instrument(fields(dir = %dir.display()))]
    pub fn load(dir: &Path) -> Result<Self> {
        for artifact in [CASES_FILE, EMBEDDINGS_FILE] {
            if !dir.join(artifact).is_file() {
                return Err(Error::IndexNotFound {
                    dir: dir.to_path_buf(),
                    missing: artifact,
                    command: BUILD_COMMAND,
                });
            }
        }

        let records = read_records(&dir.join(CASES_FILE))?;
        let embeddings = EmbeddingMatrix::read_npy(&dir.join(EMBEDDINGS_FILE))?;

        let meta_path = dir.join(META_FILE);
        let meta = if meta_path.is_file() {
            let content = fs::read_to_string(&meta_path)?;
            let meta: IndexMeta = serde_json::from_str(&content)
                .map_err(|e| Error::IndexCorrupt(format!("invalid {}: {}", META_FILE, e)))?;
            Some(meta)
        } else {
            warn!("{} missing in {}, model unknown", META_FILE, dir.display());
            None
        };

        if let Some(meta) = &meta {
            if meta.count != records.len() {
                return Err(Error::IndexCorrupt(format!(
                    "{} reports {} cases but {} has {}",
                    META_FILE,
                    meta.count,
                    CASES_FILE,
                    records.len()
                )));
            }
            if let Some(dims) = meta.dimensions {
                if dims != embeddings.dimensions() {
                    return Err(Error::IndexCorrupt(format!(
                        "{} reports {} dimensions but {} has {}",
                        META_FILE,
                        dims,
                        EMBEDDINGS_FILE,
                        embeddings.dimensions()
                    )));
                }
            }
        }

        let index = Self::new(records, embeddings, meta.map(|m| m.model))?;

        for (record, row) in index.records.iter().zip(index.embeddings.iter_rows()) {
            ensure_unit_vector(&record.id, row)
                .map_err(|e| Error::IndexCorrupt(e.to_string()))?;
        }

        info!(
            "Loaded index with {} cases ({} dims) from {}",
            index.len(),
            index.dimensions(),
            dir.display()
        );
        Ok(index)
    }

    /// Persist the index into `dir`, creating it if needed.
    ///
    /// Artifacts are written to temporary files first and renamed into place
    /// once all three are complete.
    #[instrument(skip(self), fields(dir = %dir.display(), count = self.len()))]
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let cases_tmp = tmp_path(dir, CASES_FILE);
        let embeddings_tmp = tmp_path(dir, EMBEDDINGS_FILE);
        let meta_tmp = tmp_path(dir, META_FILE);

        let written = self
            .write_records(&cases_tmp)
            .and_then(|_| self.embeddings.write_npy(&embeddings_tmp))
            .and_then(|_| {
                let mut meta_json = serde_json::to_string_pretty(&self.meta())?;
                meta_json.push('\n');
                fs::write(&meta_tmp, meta_json)?;
                Ok(())
            });

        if let Err(e) = written {
            for tmp in [&cases_tmp, &embeddings_tmp, &meta_tmp] {
                let _ = fs::remove_file(tmp);
            }
            return Err(e);
        }

        fs::rename(&cases_tmp, dir.join(CASES_FILE))?;
        fs::rename(&embeddings_tmp, dir.join(EMBEDDINGS_FILE))?;
        fs::rename(&meta_tmp, dir.join(META_FILE))?;

        info!("Saved index with {} cases to {}", self.len(), dir.display());
        Ok(())
    }

    fn write_records(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<IndexRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: IndexRecord = serde_json::from_str(line).map_err(|e| {
            Error::IndexCorrupt(format!("{} line {}: {}", CASES_FILE, line_no + 1, e))
        })?;
        records.push(record);
    }
    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

fn tmp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.tmp", name))
}
