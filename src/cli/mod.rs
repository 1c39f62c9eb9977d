//! CLI module for Casebook
//!
//! Provides commands:
//! - `build`: embed every case and write the index
//! - `serve`: load the index and start the HTTP API
//! - `search`: run one query against the index and print JSON

use crate::server::load_config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod build;
pub mod search;

/// Casebook CLI
#[derive(Parser, Debug)]
#[command(name = "casebook")]
#[command(about = "Semantic retrieval over troubleshooting cases")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the index from case files (full rebuild)
    Build {
        /// Directory containing case YAML files
        #[arg(long)]
        cases: Option<PathBuf>,
        /// Directory the index is written to
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Start the HTTP server
    Serve {
        /// Directory containing a built index
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Query the index and print matches as JSON
    Search {
        /// Free-text problem description
        query: String,
        /// Number of matches (clamped to 1..=10)
        #[arg(long = "top-k", short = 'k')]
        top_k: Option<i64>,
        /// Directory containing a built index
        #[arg(long)]
        index: Option<PathBuf>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let mut config = load_config()?;
    match command {
        Commands::Build { cases, out } => {
            override_path(&mut config.paths.cases_dir, cases);
            override_path(&mut config.paths.index_dir, out);
            build::run(&config).await
        }
        Commands::Serve { index } => {
            override_path(&mut config.paths.index_dir, index);
            crate::server::run(config).await
        }
        Commands::Search {
            query,
            top_k,
            index,
        } => {
            override_path(&mut config.paths.index_dir, index);
            search::run(&config, &query, top_k).await
        }
    }
}

fn override_path(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(value) = value {
        *target = value;
    }
}
