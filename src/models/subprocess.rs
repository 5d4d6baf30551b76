//! Embedding model backed by a child process speaking the framed protocol
//!
//! The child is started lazily on first use with `MODEL_NAME` and
//! `COMMAND_SEP` in its environment, its stderr inherited so its diagnostics
//! stay visible. Requests are serialized. If the pipe breaks, the child is
//! dropped and the request is retried once against a fresh one.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::model::{EmbeddingModel, ModelInfo};
use crate::models::{Embedding, EmbeddingError, EmbeddingResult, Precision};
use crate::protocol::{encode_request, is_pipe_closed, write_frame, FrameReader, FramedResponse};
use crate::server::config::{MODEL_NAME_ENV, SENTINEL_ENV};

/// How to start the embedding child process
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub model_name: String,
    /// Check that the child echoed back the text it was sent
    pub verify_echo: bool,
}

impl SubprocessConfig {
    pub fn new(program: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            model_name: model_name.into(),
            verify_echo: true,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

struct ChildPipes {
    // kill_on_drop ties the child's lifetime to this handle
    _child: Child,
    stdin: ChildStdin,
    stdout: FrameReader<BufReader<ChildStdout>>,
}

pub struct SubprocessEmbeddingModel {
    config: SubprocessConfig,
    sentinel: String,
    info: ModelInfo,
    // unknown (0) until the first response arrives
    dimension: AtomicUsize,
    pipes: Mutex<Option<ChildPipes>>,
}

impl SubprocessEmbeddingModel {
    pub fn new(config: SubprocessConfig) -> Self {
        let sentinel = Uuid::new_v4().simple().to_string()[..8].to_string();
        let info = ModelInfo {
            name: config.model_name.clone(),
            dimension: 0,
            max_sequence_length: 0,
            precision: Precision::BFloat16,
        };
        Self {
            config,
            sentinel,
            info,
            dimension: AtomicUsize::new(0),
            pipes: Mutex::new(None),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Whether a child process is currently running for this model
    pub async fn is_running(&self) -> bool {
        self.pipes.lock().await.is_some()
    }

    fn spawn(&self) -> EmbeddingResult<ChildPipes> {
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .env(MODEL_NAME_ENV, &self.config.model_name)
            .env(SENTINEL_ENV, &self.sentinel)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| EmbeddingError::ProtocolError {
            message: "child stdin was not captured".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EmbeddingError::ProtocolError {
            message: "child stdout was not captured".to_string(),
        })?;
        info!("Started embedding process {} (pid {:?})", self.config.program, child.id());

        Ok(ChildPipes {
            _child: child,
            stdin,
            stdout: FrameReader::new(BufReader::new(stdout), self.sentinel.as_str()),
        })
    }

    async fn exchange(pipes: &mut ChildPipes, frame: &str) -> io::Result<String> {
        write_frame(&mut pipes.stdin, frame).await?;
        pipes
            .stdout
            .read_frame()
            .await?
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
    }

    fn verify_echo(&self, sent: &str, got: &str) -> EmbeddingResult<()> {
        let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        if strip(sent) != strip(got) {
            return Err(EmbeddingError::ProtocolError {
                message: format!("sent {:?} but child echoed {:?}", sent, got),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingModel for SubprocessEmbeddingModel {
    /// Static model info. Its `dimension` stays 0 because the child reports
    /// its vector size only once it answers; use `dimension()` instead.
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn embed_text(&self, text: &str) -> EmbeddingResult<Embedding> {
        let text = text.trim();
        let frame = encode_request(text, &self.sentinel);
        let mut guard = self.pipes.lock().await;

        let mut retrying = false;
        let raw = loop {
            if guard.is_none() {
                *guard = Some(self.spawn()?);
            }
            let Some(pipes) = guard.as_mut() else {
                continue;
            };

            debug!("Encoding text ({} bytes) via child process", text.len());
            match Self::exchange(pipes, &frame).await {
                Ok(raw) => break raw,
                Err(e) if is_pipe_closed(&e) && !retrying => {
                    warn!("Embedding process pipe broken ({}), restarting", e);
                    *guard = None;
                    retrying = true;
                }
                Err(e) => {
                    // the reader may be stuck mid-frame; never reuse this child
                    *guard = None;
                    return Err(e.into());
                }
            }
        };

        let response: FramedResponse = serde_json::from_str(&raw)?;
        if self.config.verify_echo {
            self.verify_echo(text, &response.input)?;
        }
        debug!("Encoded text, vector size {}", response.embeddings.len());
        self.dimension.store(response.embeddings.len(), Ordering::Relaxed);
        Ok(response.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }
}
