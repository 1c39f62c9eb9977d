//! `casebook build`

use crate::server::AppConfig;
use anyhow::{Context, Result};
use casebook_cases::LoaderOptions;
use casebook_search::{create_provider, IndexBuilder};
use tracing::info;

/// Rebuild the index from the configured case directory
pub async fn run(config: &AppConfig) -> Result<()> {
    let paths = &config.paths;
    info!(
        "Building index from {} into {}",
        paths.cases_dir.display(),
        paths.index_dir.display()
    );

    let provider = create_provider(&config.embedding, None)
        .context("Failed to initialize embedding provider")?;
    let loader = LoaderOptions::default().with_ignore(paths.ignore.iter().cloned());

    let report = IndexBuilder::new(provider)
        .with_loader_options(loader)
        .build(&paths.cases_dir, &paths.index_dir)
        .await
        .with_context(|| format!("Failed to build index from {}", paths.cases_dir.display()))?;

    println!(
        "Indexed {} cases ({} dims, model {}) into {}",
        report.count,
        report.dimensions,
        report.model,
        report.out_dir.display()
    );
    Ok(())
}
