//! Stdio Embedder Main
//!
//! Serves one model over the sentinel-framed stdin/stdout protocol.
//! Requires `MODEL_NAME` and `COMMAND_SEP` in the environment.

use std::sync::Arc;

use embedding_service::logging::init_tracing;
use embedding_service::models::{OnnxEmbeddingModel, Precision};
use embedding_service::{ServerConfig, StdioConfig, StdioServer};
use tokio::io::BufReader;
use tracing::info;

const STDIO_LOG_LEVEL: &str = "debug";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    // per-line traces are part of normal operation here
    init_tracing(STDIO_LOG_LEVEL);

    let stdio_config = StdioConfig::from_env()?;
    info!("Loading model '{}'", stdio_config.model_name);

    let model = OnnxEmbeddingModel::load(&stdio_config.model_name, &config.models)?
        .with_precision(Precision::BFloat16);

    let server = StdioServer::new(Arc::new(model), stdio_config.sentinel);
    let exit = server
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    info!("Stopped after {} frames ({:?})", exit.frames_served, exit.reason);

    Ok(())
}
