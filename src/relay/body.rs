//! Pass-through response body for relayed streams.
//!
//! Wraps the upstream body and forwards it frame by frame. The wrapper adds
//! three things on top of plain forwarding:
//! - a total-duration deadline for the exchange
//! - conversion of upstream failures into `RelayError::StreamInterrupted`, so
//!   the server aborts the caller connection instead of ending the body cleanly
//! - detection of callers that disconnect before the stream drained
//!
//! Whichever way the stream ends, an optional hook is told exactly once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::time::Sleep;

use crate::observability::metrics;
use crate::relay::error::{RelayError, TimeoutPhase};

/// How a relayed stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The upstream body ended cleanly.
    Drained,
    /// Interrupted upstream or stream deadline.
    Failed,
    /// Dropped before the end, usually because the caller went away.
    Cancelled,
}

/// Callback run once when a relayed stream ends.
pub type StreamEndHook = Box<dyn FnOnce(StreamEnd) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Finished,
    Failed,
}

/// Upstream body wrapper with deadline and failure signalling.
pub struct RelayBody<B> {
    inner: B,
    deadline: Pin<Box<Sleep>>,
    state: StreamState,
    request_id: String,
    started: Instant,
    bytes: u64,
    chunks: u64,
    on_end: Option<StreamEndHook>,
}

impl<B> RelayBody<B> {
    /// Wrap `inner`; the stream fails once `deadline` passes.
    pub fn new(inner: B, deadline: tokio::time::Instant, request_id: impl Into<String>) -> Self {
        Self {
            inner,
            deadline: Box::pin(tokio::time::sleep_until(deadline)),
            state: StreamState::Streaming,
            request_id: request_id.into(),
            started: Instant::now(),
            bytes: 0,
            chunks: 0,
            on_end: None,
        }
    }

    /// Run `hook` once when the stream drains, fails or is dropped.
    pub fn on_end(mut self, hook: StreamEndHook) -> Self {
        self.on_end = Some(hook);
        self
    }

    fn finish(&mut self, end: StreamEnd) {
        if let Some(hook) = self.on_end.take() {
            hook(end);
        }
    }

    /// Bytes forwarded so far.
    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes
    }

    fn fail(&mut self, error: RelayError) -> RelayError {
        self.state = StreamState::Failed;
        tracing::warn!(
            request_id = %self.request_id,
            bytes = self.bytes,
            chunks = self.chunks,
            error = %error,
            "Relay stream terminated abnormally"
        );
        metrics::record_stream(error.kind(), self.bytes, self.started);
        self.finish(StreamEnd::Failed);
        error
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = RelayError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;

        if this.state != StreamState::Streaming {
            return Poll::Ready(None);
        }

        // Checked first so a continuously producing upstream still hits it.
        if this.deadline.as_mut().poll(cx).is_ready() {
            let err = this.fail(RelayError::Timeout(TimeoutPhase::Stream));
            return Poll::Ready(Some(Err(err)));
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes += data.len() as u64;
                    this.chunks += 1;
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                let cause: Box<dyn std::error::Error + Send + Sync> = e.into();
                let err = this.fail(RelayError::StreamInterrupted(cause.to_string()));
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.state = StreamState::Finished;
                tracing::debug!(
                    request_id = %this.request_id,
                    bytes = this.bytes,
                    chunks = this.chunks,
                    elapsed_ms = this.started.elapsed().as_millis() as u64,
                    "Relay stream completed"
                );
                metrics::record_stream("completed", this.bytes, this.started);
                this.finish(StreamEnd::Drained);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.state != StreamState::Streaming || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for RelayBody<B> {
    fn drop(&mut self) {
        if self.state == StreamState::Streaming {
            // Dropping `inner` here closes the upstream connection.
            tracing::info!(
                request_id = %self.request_id,
                bytes = self.bytes,
                chunks = self.chunks,
                "Relay stream dropped before completion, closing upstream"
            );
            metrics::record_stream("cancelled", self.bytes, self.started);
            self.finish(StreamEnd::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use http_body_util::{BodyExt, Full, StreamBody};
    use std::time::Duration;
    use tokio::sync::mpsc;

    type Chunk = Result<Frame<Bytes>, std::io::Error>;

    fn channel_body(
        rx: mpsc::Receiver<Chunk>,
    ) -> StreamBody<Pin<Box<dyn futures_util::Stream<Item = Chunk> + Send>>> {
        let s: Pin<Box<dyn futures_util::Stream<Item = Chunk> + Send>> =
            Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|c| (c, rx))
            }));
        StreamBody::new(s)
    }

    fn far_deadline() -> tokio::time::Instant {
        tokio::time::Instant::now() + Duration::from_secs(30)
    }

    #[tokio::test]
    async fn test_forwards_full_body() {
        let body = RelayBody::new(Full::new(Bytes::from("hello")), far_deadline(), "req-1");
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_frames_are_forwarded_as_they_arrive() {
        let (tx, rx) = mpsc::channel(1);
        let mut body = RelayBody::new(channel_body(rx), far_deadline(), "req-2");

        tx.send(Ok(Frame::data(Bytes::from("first")))).await.unwrap();
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from("first"));

        // The second chunk does not exist yet; nothing has been buffered ahead.
        assert_eq!(body.bytes_forwarded(), 5);

        tx.send(Ok(Frame::data(Bytes::from("second")))).await.unwrap();
        drop(tx);
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from("second"));
        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_upstream_error_interrupts_stream() {
        let (tx, rx) = mpsc::channel(4);
        let mut body = RelayBody::new(channel_body(rx), far_deadline(), "req-3");

        tx.send(Ok(Frame::data(Bytes::from("partial")))).await.unwrap();
        tx.send(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        )))
        .await
        .unwrap();

        assert!(body.frame().await.unwrap().is_ok());
        let err = body.frame().await.unwrap().unwrap_err();
        assert!(matches!(err, RelayError::StreamInterrupted(_)));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_deadline_fails_stalled_stream() {
        let (_tx, rx) = mpsc::channel::<Chunk>(1);
        let deadline = tokio::time::Instant::now() + Duration::from_millis(50);
        let mut body = RelayBody::new(channel_body(rx), deadline, "req-4");

        let err = body.frame().await.unwrap().unwrap_err();
        assert!(matches!(err, RelayError::Timeout(TimeoutPhase::Stream)));
    }

    #[tokio::test]
    async fn test_drop_mid_stream_releases_upstream() {
        let (tx, rx) = mpsc::channel(4);
        let mut body = RelayBody::new(channel_body(rx), far_deadline(), "req-5");

        tx.send(Ok(Frame::data(Bytes::from("one")))).await.unwrap();
        assert!(body.frame().await.unwrap().is_ok());

        drop(body);
        assert!(tx.is_closed());
        assert!(tx.send(Ok(Frame::data(Bytes::from("two")))).await.is_err());
    }

    fn recording_hook() -> (StreamEndHook, std::sync::Arc<std::sync::Mutex<Vec<StreamEnd>>>) {
        let ends = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = ends.clone();
        let hook: StreamEndHook = Box::new(move |end| sink.lock().unwrap().push(end));
        (hook, ends)
    }

    #[tokio::test]
    async fn test_end_hook_runs_once_per_outcome() {
        let (hook, ends) = recording_hook();
        let body = RelayBody::new(Full::new(Bytes::from("done")), far_deadline(), "req-6")
            .on_end(hook);
        body.collect().await.unwrap();
        assert_eq!(*ends.lock().unwrap(), [StreamEnd::Drained]);

        let (hook, ends) = recording_hook();
        let (tx, rx) = mpsc::channel(1);
        let mut body = RelayBody::new(channel_body(rx), far_deadline(), "req-7").on_end(hook);
        tx.send(Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "eof")))
            .await
            .unwrap();
        assert!(body.frame().await.unwrap().is_err());
        drop(body);
        assert_eq!(*ends.lock().unwrap(), [StreamEnd::Failed]);

        let (hook, ends) = recording_hook();
        let (_tx, rx) = mpsc::channel::<Chunk>(1);
        let body = RelayBody::new(channel_body(rx), far_deadline(), "req-8").on_end(hook);
        drop(body);
        assert_eq!(*ends.lock().unwrap(), [StreamEnd::Cancelled]);
    }
}
