//! Sentinel-framed line protocol used over stdin/stdout
//!
//! Protocol Format:
//! - Request: any number of text lines, then a line exactly equal to the
//!   sentinel. The text lines, with trailing whitespace stripped, joined by
//!   `\n` form the input.
//! - Response: one JSON object `{"embeddings": [...], "input": "..."}`, a
//!   newline, the sentinel, and a trailing newline.
//!
//! There is no escaping. A payload line equal to the sentinel ends the frame
//! early; callers pick a sentinel that cannot occur in their text.

pub mod http;

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Embedding response written back over the framed protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramedResponse {
    pub embeddings: Vec<f32>,
    pub input: String,
}

/// Reads sentinel-terminated frames line by line
pub struct FrameReader<R> {
    reader: R,
    sentinel: String,
    line: String,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, sentinel: impl Into<String>) -> Self {
        Self {
            reader,
            sentinel: sentinel.into(),
            line: String::new(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the input ends; lines buffered without a
    /// closing sentinel are dropped.
    pub async fn read_frame(&mut self) -> io::Result<Option<String>> {
        let mut accum: Vec<String> = Vec::new();
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                if !accum.is_empty() {
                    debug!("Input closed with {} unterminated lines", accum.len());
                }
                return Ok(None);
            }

            let line = self.line.trim_end();
            debug!("Read line: {:?}", line);
            if line == self.sentinel {
                let text = accum.join("\n");
                debug!("Assembled input: {:?}", text);
                return Ok(Some(text));
            }
            accum.push(line.to_string());
        }
    }
}

/// Encode a response frame: JSON, newline, sentinel, newline.
pub fn encode_response(response: &FramedResponse, sentinel: &str) -> serde_json::Result<String> {
    let json = serde_json::to_string(response)?;
    Ok(format!("{}\n{}\n", json, sentinel))
}

/// Encode a request frame: the text, newline, sentinel, newline.
pub fn encode_request(text: &str, sentinel: &str) -> String {
    format!("{}\n{}\n", text, sentinel)
}

/// Write one encoded frame with a single write and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &str) -> io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}

/// Whether an I/O error means the peer end of a pipe went away.
pub fn is_pipe_closed(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof
    )
}
