//! HTTP server
//!
//! Loads the index before binding, so a server that accepts connections
//! always has something to search.

mod config;
mod loader;

pub use config::AppConfig;
pub use loader::load_config;

use crate::api::{api_router, AppContext};
use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use casebook_search::{create_provider, Index, RetrievalEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Load the configured index and attach an embedding provider to it
pub fn open_engine(config: &AppConfig) -> Result<RetrievalEngine> {
    let index_dir = &config.paths.index_dir;
    let index = Index::load(index_dir)
        .with_context(|| format!("Failed to load index from {}", index_dir.display()))?;

    let provider = create_provider(&config.embedding, index.model())
        .context("Failed to initialize embedding provider")?;
    if let Some(built_with) = index.model() {
        if built_with != provider.model() {
            warn!(
                "Index was built with {} but queries use {}",
                built_with,
                provider.model()
            );
        }
    }

    info!(
        "Loaded {} cases ({} dims) from {}",
        index.len(),
        index.dimensions(),
        index_dir.display()
    );
    Ok(RetrievalEngine::new(index, provider)
        .with_embed_timeout(Duration::from_secs(config.retrieval.embed_timeout_secs)))
}

/// Browser access restricted to the configured origins; `*` allows any origin
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin.trim() == "*") {
        AllowOrigin::any()
    } else {
        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Casebook v{}", env!("CARGO_PKG_VERSION"));

    let engine = open_engine(&config)?;
    let context = Arc::new(AppContext::new(engine, config.retrieval.default_top_k));

    let app = api_router(context)
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Casebook shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
