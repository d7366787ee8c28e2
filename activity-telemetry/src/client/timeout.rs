//! Idle timeout wrapper for the activity stream.
//!
//! The server only writes when entries arrive, and a half-open TCP connection never
//! produces an error on its own. Wrapping the read half in a [`TimeoutStream`] ends the
//! stream after a quiet period so the client's reconnect loop takes over. Pong frames
//! answering the client's pings count as traffic, so a healthy idle connection stays up.

use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Instant;

/// Default idle timeout for either end of the activity stream (2 minutes).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Ends the inner stream once no item has been received for `timeout_duration`.
#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    timeout_duration: Duration,
    deadline: Pin<Box<tokio::time::Sleep>>,
    timed_out: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout_duration: Duration) -> Self {
        Self {
            inner,
            timeout_duration,
            deadline: Box::pin(tokio::time::sleep(timeout_duration)),
            timed_out: false,
        }
    }

    /// Whether the stream ended because of the idle timeout rather than the inner stream
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.timed_out {
            return Poll::Ready(None);
        }

        let timeout_duration = self.timeout_duration;

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.deadline
                    .as_mut()
                    .reset(Instant::now() + timeout_duration);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    tracing::warn!(
                        timeout_secs = timeout_duration.as_secs(),
                        "activity stream read timeout - no data received, triggering reconnection"
                    );
                    self.timed_out = true;
                    Poll::Ready(None)
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
