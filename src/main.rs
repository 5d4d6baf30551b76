//! Embedding Service Main
//!
//! Entry point for the HTTP embedding server

use std::sync::Arc;

use embedding_service::logging::init_tracing;
use embedding_service::models::{ModelCache, OnnxModelLoader};
use embedding_service::{start_hyper_http_server, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    init_tracing(&config.monitoring.log_level);

    info!("🚀 HTTP Embedding Service v{}", env!("CARGO_PKG_VERSION"));
    info!("📦 Models directory: {}", config.models.models_dir);

    let loader = Arc::new(OnnxModelLoader::new(config.models.clone()));
    let cache = Arc::new(ModelCache::new(loader));

    start_hyper_http_server(Arc::new(config), cache).await?;

    Ok(())
}
