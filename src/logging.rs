//! Tracing setup shared by both binaries
//!
//! Output always goes to stderr: stdout carries the framed protocol when
//! running as the stdio embedder.

use tracing_subscriber::EnvFilter;

/// Map a configured level name to a default filter directive. Dependencies
/// (ONNX Runtime in particular) stay at `info` below that level.
pub fn default_filter(log_level: &str) -> String {
    match log_level.to_lowercase().as_str() {
        "trace" => "embedding_service=trace,info".to_string(),
        "debug" => "embedding_service=debug,info".to_string(),
        "info" => "embedding_service=info,info".to_string(),
        "warn" => "embedding_service=warn,warn".to_string(),
        "error" => "embedding_service=error,error".to_string(),
        _ => "embedding_service=info,info".to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)))
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .init();
}
