//! Server module

pub mod config;
pub mod hyper_server;
pub mod stdio;

pub use config::{ConfigError, ServerConfig, StdioConfig};
pub use hyper_server::start_hyper_http_server;
pub use stdio::{LoopExit, Shutdown, StdioServer};
