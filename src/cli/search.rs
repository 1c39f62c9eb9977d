//! `casebook search`

use crate::api::AskResponse;
use crate::server::{open_engine, AppConfig};
use anyhow::{Context, Result};

/// Run a single query and print the `/ask` response body
pub async fn run(config: &AppConfig, query: &str, top_k: Option<i64>) -> Result<()> {
    let engine = open_engine(config)?;
    let requested = top_k.unwrap_or(config.retrieval.default_top_k);

    let matches = engine
        .search(query, requested)
        .await
        .context("Search failed")?;

    let response = AskResponse::new(query, requested, matches);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
