//! Case directory loader
//!
//! Reads every case document directly under a directory, in file-name order.
//! A single malformed document fails the whole load.

use crate::case::Case;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Which files in the case directory count as case documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderOptions {
    /// Accepted file extensions (without the dot)
    pub extensions: Vec<String>,
    /// File names that are never loaded (e.g. authoring templates)
    pub ignore: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["yaml".to_string(), "yml".to_string()],
            ignore: vec!["_template.yaml".to_string()],
        }
    }
}

impl LoaderOptions {
    /// Replace the ignore list
    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `path` names a case document
    pub fn is_case_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.ignore.iter().any(|ignored| ignored == name) {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }
}

/// Load all cases under `dir`, sorted by file name.
#[instrument(skip(options), fields(dir = %dir.display()))]
pub fn load_cases(dir: &Path, options: &LoaderOptions) -> Result<Vec<Case>> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && options.is_case_file(&path) {
            paths.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let cases = paths
        .iter()
        .map(|path| load_case(path))
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} cases from {}", cases.len(), dir.display());
    Ok(cases)
}

/// Load a single case document.
pub fn load_case(path: &Path) -> Result<Case> {
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: format!("invalid YAML: {}", e),
        })?;

    if !document.is_mapping() {
        return Err(Error::Parse {
            path: path.to_path_buf(),
            message: "top level of a case document must be a mapping".to_string(),
        });
    }

    let case: Case = serde_yaml::from_value(document).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if case.id.trim().is_empty() {
        return Err(Error::MissingId {
            path: path.to_path_buf(),
        });
    }

    Ok(case)
}
