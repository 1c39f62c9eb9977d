//! Casebook Search - Case Index and Similarity Retrieval
//!
//! This crate turns a directory of cases into a persisted vector index and
//! answers free-text queries against it:
//! - `IndexBuilder`: load, project, embed and persist cases
//! - `Index`: the on-disk artifacts, validated on load
//! - `RetrievalEngine`: brute-force cosine ranking over the loaded index
//! - `EmbeddingProvider`: the injected text → unit vector capability
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌───────────────────┐
//! │ cases/*.yaml │──►│ project() │──►│ EmbeddingProvider │
//! └──────────────┘   └───────────┘   └─────────┬─────────┘
//!                                              ▼
//!                         ┌─────────────────────────────────────┐
//!                         │ index/ cases.jsonl  embeddings.npy  │
//!                         │        meta.json                    │
//!                         └─────────────────┬───────────────────┘
//!                                           ▼
//!                 query ──► RetrievalEngine (q · v, top-k) ──► [Match]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use casebook_search::{IndexBuilder, Index, RetrievalEngine};
//!
//! let provider = create_provider(&EmbeddingSettings::default(), None)?;
//! IndexBuilder::new(provider.clone()).build(Path::new("cases"), Path::new("index")).await?;
//!
//! let engine = RetrievalEngine::new(Index::load(Path::new("index"))?, provider);
//! for m in engine.search("vpn keeps dropping", 3).await? {
//!     println!("{}: score={:.3}", m.id, m.score);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod npy;
pub mod store;

#[cfg(test)]
#[allow(missing_docs)]
mod testing;

pub use builder::{BuildReport, IndexBuilder};
pub use embeddings::{
    create_provider, EmbeddingProvider, EmbeddingSettings, ProviderKind, SharedEmbeddingProvider,
};
pub use engine::{effective_top_k, Match, RecommendedNext, RetrievalEngine, MAX_TOP_K, MIN_TOP_K};
pub use error::{Error, Result};
pub use store::{EmbeddingMatrix, Index, IndexMeta, IndexRecord};
