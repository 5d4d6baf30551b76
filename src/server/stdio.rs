//! Framed stdin/stdout embedding loop
//!
//! Reads one sentinel-terminated text block at a time, embeds it with a
//! single model fixed at startup and writes the framed JSON response. Blocks
//! are handled strictly in order, one at a time.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info};

use crate::models::{EmbeddingModel, EmbeddingResult};
use crate::protocol::{encode_response, is_pipe_closed, write_frame, FrameReader, FramedResponse};

/// Why the loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// stdin reached EOF or its producer went away
    InputClosed,
    /// the stdout consumer went away mid-write
    OutputClosed,
}

/// Summary of a finished loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    pub reason: Shutdown,
    pub frames_served: u64,
}

pub struct StdioServer {
    model: Arc<dyn EmbeddingModel>,
    sentinel: String,
}

impl StdioServer {
    pub fn new(model: Arc<dyn EmbeddingModel>, sentinel: impl Into<String>) -> Self {
        Self {
            model,
            sentinel: sentinel.into(),
        }
    }

    /// Serve frames from `reader` to `writer` until either pipe closes.
    ///
    /// Pipe closure ends the loop with `Ok`; model failures and any other
    /// I/O error are returned.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> EmbeddingResult<LoopExit>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(
            "Serving model '{}' ({} dimensions) on stdio",
            self.model.info().name,
            self.model.dimension()
        );
        let mut frames = FrameReader::new(reader, self.sentinel.as_str());
        let mut frames_served = 0u64;

        loop {
            let input = match frames.read_frame().await {
                Ok(Some(input)) => input,
                Ok(None) => return Ok(self.exit(Shutdown::InputClosed, frames_served)),
                Err(e) if is_pipe_closed(&e) => {
                    return Ok(self.exit(Shutdown::InputClosed, frames_served));
                }
                Err(e) => return Err(e.into()),
            };

            let embeddings = self.model.embed_text(&input).await?;
            let response = FramedResponse { embeddings, input };
            let frame = encode_response(&response, &self.sentinel)?;

            debug!("Writing response ({} bytes)", frame.len());
            match write_frame(&mut writer, &frame).await {
                Ok(()) => {}
                Err(e) if is_pipe_closed(&e) => {
                    return Ok(self.exit(Shutdown::OutputClosed, frames_served));
                }
                Err(e) => return Err(e.into()),
            }
            frames_served += 1;
            debug!("Response written (frame {})", frames_served);
        }
    }

    fn exit(&self, reason: Shutdown, frames_served: u64) -> LoopExit {
        info!("Pipe closed ({:?}) after {} frames, exiting", reason, frames_served);
        LoopExit { reason, frames_served }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mock::MockEmbeddingModel;
    use crate::models::{EmbeddingError, Precision};
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, BufReader, ReadBuf};

    const SENTINEL: &str = "<<END>>";

    fn server(dimension: usize) -> StdioServer {
        StdioServer::new(Arc::new(MockEmbeddingModel::new("mock", dimension)), SENTINEL)
    }

    /// Writer whose reader end is already gone
    struct ClosedPipe;

    impl AsyncWrite for ClosedPipe {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Writer failing with an error unrelated to pipe closure
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Reader whose writer end fails with the given error kind
    struct BrokenInput(io::ErrorKind);

    impl AsyncRead for BrokenInput {
        fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, _: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::from(self.0)))
        }
    }

    impl AsyncBufRead for BrokenInput {
        fn poll_fill_buf(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
            Poll::Ready(Err(io::Error::from(self.0)))
        }

        fn consume(self: Pin<&mut Self>, _: usize) {}
    }

    /// Reader recording how many input bytes the loop has consumed
    struct TrackingReader<R> {
        inner: R,
        consumed: Arc<AtomicUsize>,
    }

    impl<R: AsyncRead + Unpin> AsyncRead for TrackingReader<R> {
        fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let before = buf.filled().len();
            let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
            this.consumed.fetch_add(buf.filled().len() - before, Ordering::SeqCst);
            poll
        }
    }

    impl<R: AsyncBufRead + Unpin> AsyncBufRead for TrackingReader<R> {
        fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
            Pin::new(&mut self.get_mut().inner).poll_fill_buf(cx)
        }

        fn consume(self: Pin<&mut Self>, amt: usize) {
            let this = self.get_mut();
            this.consumed.fetch_add(amt, Ordering::SeqCst);
            Pin::new(&mut this.inner).consume(amt);
        }
    }

    #[tokio::test]
    async fn test_round_trip_hello_world() {
        let input: &[u8] = b"hello\nworld\n<<END>>\n";
        let mut out: Vec<u8> = Vec::new();

        let exit = server(12).run(BufReader::new(input), &mut out).await.unwrap();
        assert_eq!(exit, LoopExit { reason: Shutdown::InputClosed, frames_served: 1 });

        let out = String::from_utf8(out).unwrap();
        let (json, rest) = out.split_once('\n').unwrap();
        assert_eq!(rest, "<<END>>\n");

        let response: FramedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.input, "hello\nworld");
        assert_eq!(response.embeddings.len(), 12);
    }

    #[tokio::test]
    async fn test_outputs_follow_input_order() {
        let input: &[u8] = b"first\n<<END>>\nsecond\n<<END>>\nthird\n<<END>>\n";
        let mut out: Vec<u8> = Vec::new();

        let exit = server(4).run(BufReader::new(input), &mut out).await.unwrap();
        assert_eq!(exit.frames_served, 3);

        let out = String::from_utf8(out).unwrap();
        let inputs: Vec<String> = out
            .lines()
            .filter(|line| *line != SENTINEL)
            .map(|line| serde_json::from_str::<FramedResponse>(line).unwrap().input)
            .collect();
        assert_eq!(inputs, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_identical_inputs_give_identical_embeddings() {
        let input: &[u8] = b"same\n<<END>>\nsame\n<<END>>\n";
        let mut out: Vec<u8> = Vec::new();
        server(8).run(BufReader::new(input), &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        let responses: Vec<FramedResponse> = out
            .lines()
            .filter(|line| *line != SENTINEL)
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses[0], responses[1]);
    }

    #[tokio::test]
    async fn test_closed_output_exits_cleanly_without_more_reads() {
        let first_frame = "one\n<<END>>\n";
        let input = format!("{first_frame}two\n<<END>>\n");
        let consumed = Arc::new(AtomicUsize::new(0));
        let reader = TrackingReader {
            inner: BufReader::new(input.as_bytes()),
            consumed: consumed.clone(),
        };

        let exit = server(4).run(reader, ClosedPipe).await.unwrap();
        assert_eq!(exit, LoopExit { reason: Shutdown::OutputClosed, frames_served: 0 });
        assert_eq!(consumed.load(Ordering::SeqCst), first_frame.len());
    }

    #[tokio::test]
    async fn test_closed_input_exits_cleanly() {
        for kind in [io::ErrorKind::BrokenPipe, io::ErrorKind::ConnectionReset] {
            let mut out: Vec<u8> = Vec::new();
            let exit = server(4).run(BrokenInput(kind), &mut out).await.unwrap();
            assert_eq!(exit, LoopExit { reason: Shutdown::InputClosed, frames_served: 0 });
            assert!(out.is_empty());
        }
    }

    #[tokio::test]
    async fn test_other_read_errors_propagate() {
        let mut out: Vec<u8> = Vec::new();
        let result = server(4).run(BrokenInput(io::ErrorKind::PermissionDenied), &mut out).await;
        assert!(matches!(result, Err(EmbeddingError::IoError { .. })));
    }

    #[tokio::test]
    async fn test_other_write_errors_propagate() {
        let input: &[u8] = b"one\n<<END>>\n";
        let result = server(4).run(BufReader::new(input), FullDisk).await;
        assert!(matches!(result, Err(EmbeddingError::IoError { .. })));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let model = MockEmbeddingModel::new("mock", 4).failing_on("bad");
        let server = StdioServer::new(Arc::new(model), SENTINEL);
        let input: &[u8] = b"bad\n<<END>>\nnever\n<<END>>\n";
        let mut out: Vec<u8> = Vec::new();

        let result = server.run(BufReader::new(input), &mut out).await;
        assert!(matches!(result, Err(EmbeddingError::InferenceError { .. })));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_reduced_precision_model_output() {
        let model = MockEmbeddingModel::new("mock", 6).with_precision(Precision::BFloat16);
        let server = StdioServer::new(Arc::new(model), SENTINEL);
        let input: &[u8] = b"text\n<<END>>\n";
        let mut out: Vec<u8> = Vec::new();
        server.run(BufReader::new(input), &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        let response: FramedResponse = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        for value in response.embeddings {
            assert_eq!(value.to_bits() & 0xFFFF, 0);
        }
    }
}
