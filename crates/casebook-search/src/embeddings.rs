//! Embedding providers
//!
//! The index builder and the retrieval engine only ever see the
//! [`EmbeddingProvider`] trait. Two backends ship with the crate:
//! - `FastEmbedProvider`: local ONNX model via fastembed (`embeddings` feature)
//! - `OpenAiEmbeddingProvider`: any OpenAI-compatible `/embeddings` endpoint
//!
//! Both return L2-normalized vectors, so a dot product between a stored
//! vector and a query vector is their cosine similarity.
//!
//! # Example
//!
//! ```ignore
//! use casebook_search::embeddings::{create_provider, EmbeddingSettings};
//!
//! let provider = create_provider(&EmbeddingSettings::default(), None)?;
//! let vectors = provider.embed_batch(&["disk full".to_string()]).await?;
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Model used when neither configuration nor index metadata names one
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Maximum deviation from unit length accepted for an embedding
pub const NORM_TOLERANCE: f32 = 1e-3;

/// Trait for embedding providers
///
/// Implementations must be safe to call from many concurrent requests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of texts, one vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (singleton batch)
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Empty embedding result".to_string()))
    }

    /// Embedding dimension, when known before the first call
    fn dimensions(&self) -> Option<usize>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model identifier
    fn model(&self) -> &str;
}

/// Wrapper for thread-safe embedding provider access
pub type SharedEmbeddingProvider = Arc<dyn EmbeddingProvider>;

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&vector);
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
    vector
}

/// Euclidean length of a vector
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt() as f32
}

/// Whether a vector is finite and unit length within [`NORM_TOLERANCE`]
pub fn is_unit_vector(vector: &[f32]) -> bool {
    !vector.is_empty()
        && vector.iter().all(|v| v.is_finite())
        && (l2_norm(vector) - 1.0).abs() <= NORM_TOLERANCE
}

/// Fail with [`Error::NotNormalized`] unless `vector` is unit length
pub fn ensure_unit_vector(subject: &str, vector: &[f32]) -> Result<()> {
    if is_unit_vector(vector) {
        Ok(())
    } else {
        Err(Error::NotNormalized {
            subject: subject.to_string(),
            norm: l2_norm(vector),
        })
    }
}

/// Dot product of two equal-length vectors
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Settings
// ============================================================================

/// Which backend produces embeddings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local model through fastembed
    #[default]
    Fastembed,
    /// OpenAI-compatible HTTP endpoint
    Openai,
}

impl ProviderKind {
    /// Whether this build can construct the backend
    pub fn is_available(self) -> bool {
        match self {
            ProviderKind::Fastembed => cfg!(feature = "embeddings"),
            ProviderKind::Openai => true,
        }
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Backend to use
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model identifier; falls back to the index metadata, then [`DEFAULT_MODEL`]
    #[serde(default)]
    pub model: Option<String>,
    /// Where the local model is cached
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key for the HTTP backend (optional for local servers)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Requested output dimension for the HTTP backend
    #[serde(default)]
    pub dimensions: Option<usize>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Max inputs per HTTP request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            cache_dir: None,
            base_url: default_base_url(),
            api_key: None,
            dimensions: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl EmbeddingSettings {
    /// Model to use given an optional hint from index metadata
    pub fn resolve_model(&self, model_hint: Option<&str>) -> String {
        self.model
            .as_deref()
            .or(model_hint)
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }
}

/// Create the configured embedding provider.
///
/// `model_hint` is the model recorded in an existing index, so that serving
/// uses the same model the index was built with unless configuration overrides it.
pub fn create_provider(
    settings: &EmbeddingSettings,
    model_hint: Option<&str>,
) -> Result<SharedEmbeddingProvider> {
    let model = settings.resolve_model(model_hint);
    info!(
        "Using {:?} embedding provider with model {}",
        settings.provider, model
    );
    match settings.provider {
        ProviderKind::Fastembed => create_fastembed(&model, settings.cache_dir.as_deref()),
        ProviderKind::Openai => Ok(Arc::new(OpenAiEmbeddingProvider::new(
            settings.api_key.clone(),
            &settings.base_url,
            model,
            settings.dimensions,
            Duration::from_secs(settings.timeout_secs),
            settings.batch_size,
        )?)),
    }
}

#[cfg(feature = "embeddings")]
fn create_fastembed(
    model: &str,
    cache_dir: Option<&std::path::Path>,
) -> Result<SharedEmbeddingProvider> {
    Ok(Arc::new(FastEmbedProvider::new(model, cache_dir)?))
}

/// Placeholder when embeddings feature is disabled
#[cfg(not(feature = "embeddings"))]
fn create_fastembed(
    _model: &str,
    _cache_dir: Option<&std::path::Path>,
) -> Result<SharedEmbeddingProvider> {
    Err(Error::Embedding(
        "Local embeddings not enabled. Compile with --features embeddings or set embedding.provider = \"openai\"".to_string(),
    ))
}

// ============================================================================
// FastEmbed
// ============================================================================

/// FastEmbed provider running a local ONNX sentence-transformer model
///
/// - **Free**: No API costs, runs locally
/// - **Offline**: Works without internet after initial model download
#[cfg(feature = "embeddings")]
pub struct FastEmbedProvider {
    model: Arc<fastembed::TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

#[cfg(feature = "embeddings")]
impl FastEmbedProvider {
    /// Create a provider for a supported model identifier
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unknown, the download fails (first run
    /// only) or the ONNX runtime fails to initialize.
    pub fn new(model: &str, cache_dir: Option<&std::path::Path>) -> Result<Self> {
        let (kind, canonical, dimensions) = resolve_fastembed_model(model)?;
        info!("Initializing FastEmbed provider with model: {}", canonical);

        let mut init_options =
            fastembed::InitOptions::new(kind).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir.to_path_buf());
        }

        let text_embedding = fastembed::TextEmbedding::try_new(init_options)
            .map_err(|e| Error::Embedding(format!("Failed to initialize FastEmbed: {}", e)))?;

        info!(
            "FastEmbed provider initialized: {} ({} dimensions)",
            canonical, dimensions
        );

        Ok(Self {
            model: Arc::new(text_embedding),
            model_name: canonical.to_string(),
            dimensions,
        })
    }
}

#[cfg(feature = "embeddings")]
fn resolve_fastembed_model(
    name: &str,
) -> Result<(fastembed::EmbeddingModel, &'static str, usize)> {
    use fastembed::EmbeddingModel;

    let short = name.rsplit('/').next().unwrap_or(name);
    match short {
        "all-MiniLM-L6-v2" => Ok((
            EmbeddingModel::AllMiniLML6V2,
            "sentence-transformers/all-MiniLM-L6-v2",
            384,
        )),
        "all-MiniLM-L12-v2" => Ok((
            EmbeddingModel::AllMiniLML12V2,
            "sentence-transformers/all-MiniLM-L12-v2",
            384,
        )),
        "bge-small-en-v1.5" => Ok((
            EmbeddingModel::BGESmallENV15,
            "BAAI/bge-small-en-v1.5",
            384,
        )),
        "nomic-embed-text-v1.5" => Ok((
            EmbeddingModel::NomicEmbedTextV15,
            "nomic-ai/nomic-embed-text-v1.5",
            768,
        )),
        other => Err(Error::Embedding(format!(
            "Unsupported local embedding model: {}",
            other
        ))),
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts = texts.to_vec();
        let model = self.model.clone();

        // fastembed is synchronous
        let embeddings = tokio::task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| Error::Embedding(format!("Batch embedding failed: {}", e)))
        })
        .await
        .map_err(|e| Error::Embedding(format!("Task join error: {}", e)))??;

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings.into_iter().map(l2_normalize).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    fn name(&self) -> &str {
        "fastembed"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}

// ============================================================================
// OpenAI-compatible HTTP
// ============================================================================

/// Embeddings client for OpenAI-compatible endpoints (OpenAI, Ollama, vLLM, ...)
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAiEmbeddingProvider {
    /// Build a new client
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Embedding("missing embedding model name".to_string()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| Error::Embedding("invalid embedding API key".to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Embedding(format!(
                "embedding request failed ({}): {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("invalid embedding response: {}", e)))?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != inputs.len() {
            return Err(Error::Embedding(format!(
                "endpoint returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        Ok(parsed
            .data
            .into_iter()
            .map(|entry| l2_normalize(entry.embedding))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            embeddings.extend(self.request(chunk).await?);
        }
        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
