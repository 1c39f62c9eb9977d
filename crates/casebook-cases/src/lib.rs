//! Casebook Cases - Troubleshooting Case Records
//!
//! This crate owns everything about authored cases:
//! - `Case`: the troubleshooting record model
//! - `load_cases`: reads a directory of YAML case documents
//! - `project`: turns a case into the text fed to the embedding model
//!
//! # Example
//!
//! ```ignore
//! use casebook_cases::{load_cases, project, LoaderOptions};
//!
//! let cases = load_cases(Path::new("cases"), &LoaderOptions::default())?;
//! let texts: Vec<String> = cases.iter().map(project).collect();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod case;
pub mod error;
pub mod loader;
pub mod projector;

pub use case::Case;
pub use error::{Error, Result};
pub use loader::{load_case, load_cases, LoaderOptions};
pub use projector::{project, LIST_SEPARATOR};
