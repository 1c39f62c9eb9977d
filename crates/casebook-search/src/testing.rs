//! Deterministic embedding providers for tests

use crate::embeddings::{l2_normalize, EmbeddingProvider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Hashes lowercase tokens into a small bag-of-words vector
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub const DIMENSIONS: usize = 16;

    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; Self::DIMENSIONS];
        for token in text.split_whitespace() {
            let bucket = token
                .to_lowercase()
                .bytes()
                .fold(2166136261u32, |hash, b| (hash ^ u32::from(b)).wrapping_mul(16777619));
            vector[bucket as usize % Self::DIMENSIONS] += 1.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        l2_normalize(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(Self::DIMENSIONS)
    }

    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Returns a preset vector for every input and records what it was asked
pub struct FixedEmbedder {
    vector: Option<Vec<f32>>,
    seen: Mutex<Vec<String>>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// An embedder whose every call fails
    pub fn failing() -> Self {
        Self {
            vector: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(texts.iter().cloned());
        match &self.vector {
            Some(vector) => Ok(texts.iter().map(|_| vector.clone()).collect()),
            None => Err(Error::Embedding("model unavailable".to_string())),
        }
    }

    fn dimensions(&self) -> Option<usize> {
        self.vector.as_ref().map(Vec::len)
    }

    fn name(&self) -> &str {
        "fixed"
    }

    fn model(&self) -> &str {
        "fixed-test"
    }
}
