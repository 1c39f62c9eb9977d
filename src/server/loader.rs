//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/local").required(false))
        // CASEBOOK_SERVER__PORT, CASEBOOK_EMBEDDING__API_KEY, ...
        .add_source(
            Environment::with_prefix("CASEBOOK")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .with_list_parse_key("paths.ignore")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.cors_origins.len(), 2);
        assert_eq!(config.retrieval.default_top_k, 1);
        assert_eq!(config.retrieval.embed_timeout_secs, 30);
        assert_eq!(config.paths.ignore, vec!["_template.yaml"]);
        assert_eq!(
            config.embedding.provider,
            casebook_search::ProviderKind::Fastembed
        );
    }

    #[test]
    fn test_default_provider_is_built_in() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(
            config.embedding.provider.is_available(),
            "{:?} needs a cargo feature this build lacks",
            config.embedding.provider
        );
    }

    #[test]
    fn test_defaults_match_embedded_file() {
        let embedded: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let fallback = AppConfig::default();

        assert_eq!(embedded.server.host, fallback.server.host);
        assert_eq!(embedded.server.cors_origins, fallback.server.cors_origins);
        assert_eq!(embedded.paths.index_dir, fallback.paths.index_dir);
        assert_eq!(embedded.embedding.base_url, fallback.embedding.base_url);
    }
}
