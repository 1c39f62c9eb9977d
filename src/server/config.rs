//! Server configuration types

use casebook_search::EmbeddingSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to call the API from a browser
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1:5500".to_string(),
        "http://localhost:5500".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_cases_dir")]
    pub cases_dir: PathBuf,
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    /// Case file names skipped by the loader
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_cases_dir() -> PathBuf {
    PathBuf::from("cases")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("index")
}

fn default_ignore() -> Vec<String> {
    vec!["_template.yaml".to_string()]
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cases_dir: default_cases_dir(),
            index_dir: default_index_dir(),
            ignore: default_ignore(),
        }
    }
}

/// Query-time settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Match count when a request does not say
    #[serde(default = "default_top_k")]
    pub default_top_k: i64,
    /// Upper bound on one query embedding call
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
}

fn default_top_k() -> i64 {
    1
}

fn default_embed_timeout_secs() -> u64 {
    30
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            embed_timeout_secs: default_embed_timeout_secs(),
        }
    }
}
