//! Index builder
//!
//! Loads every case, projects it to text, embeds the whole batch in one
//! provider call and persists the resulting [`Index`]. The build is a full
//! rebuild; an existing index in the output directory is replaced wholesale.

use crate::embeddings::{ensure_unit_vector, SharedEmbeddingProvider};
use crate::error::{Error, Result};
use crate::store::{EmbeddingMatrix, Index, IndexRecord};
use casebook_cases::{load_cases, LoaderOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Outcome of a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Number of cases indexed
    pub count: usize,
    /// Embedding model identifier
    pub model: String,
    /// Embedding dimension
    pub dimensions: usize,
    /// Where the artifacts were written
    pub out_dir: PathBuf,
}

/// Builds a case index with an injected embedding provider
pub struct IndexBuilder {
    provider: SharedEmbeddingProvider,
    loader: LoaderOptions,
}

impl IndexBuilder {
    /// Create a builder using default loader options
    pub fn new(provider: SharedEmbeddingProvider) -> Self {
        Self {
            provider,
            loader: LoaderOptions::default(),
        }
    }

    /// Override which files count as cases
    pub fn with_loader_options(mut self, loader: LoaderOptions) -> Self {
        self.loader = loader;
        self
    }

    /// Build the index from `case_dir` and persist it into `out_dir`.
    ///
    /// # Errors
    ///
    /// - case loading errors (malformed documents fail the whole build)
    /// - [`Error::EmptyCaseSet`] when no case is found; nothing is written
    /// - embedding provider failures or non-normalized vectors
    #[instrument(skip(self), fields(case_dir = %case_dir.display(), out_dir = %out_dir.display()))]
    pub async fn build(&self, case_dir: &Path, out_dir: &Path) -> Result<BuildReport> {
        let index = self.build_index(case_dir).await?;
        index.save(out_dir)?;

        let report = BuildReport {
            count: index.len(),
            model: self.provider.model().to_string(),
            dimensions: index.dimensions(),
            out_dir: out_dir.to_path_buf(),
        };
        info!(
            "Index built with {} cases in {}",
            report.count,
            out_dir.display()
        );
        Ok(report)
    }

    /// Build the index in memory without persisting it.
    pub async fn build_index(&self, case_dir: &Path) -> Result<Index> {
        let cases = load_cases(case_dir, &self.loader)?;
        if cases.is_empty() {
            return Err(Error::EmptyCaseSet {
                dir: case_dir.to_path_buf(),
            });
        }

        let records: Vec<IndexRecord> = cases.into_iter().map(IndexRecord::from_case).collect();
        let texts: Vec<String> = records.iter().map(|r| r.embedding_text.clone()).collect();

        info!(
            "Embedding {} cases with {} ({})",
            texts.len(),
            self.provider.model(),
            self.provider.name()
        );
        let vectors = self.provider.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} embeddings for {} cases",
                vectors.len(),
                texts.len()
            )));
        }

        for (record, vector) in records.iter().zip(vectors.iter()) {
            ensure_unit_vector(&record.id, vector)?;
        }

        let embeddings = EmbeddingMatrix::from_rows(vectors)?;
        if let Some(expected) = self.provider.dimensions() {
            if expected != embeddings.dimensions() {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: embeddings.dimensions(),
                });
            }
        }

        Index::new(records, embeddings, Some(self.provider.model().to_string()))
    }
}
