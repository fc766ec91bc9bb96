//! Boundary trait for the message transport.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Channel error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,
    #[error("Channel rejected frame: {0}")]
    Rejected(String),
}

/// Bidirectional, message-oriented transport to the remote coordinator.
///
/// Frames are text (JSON); encoding and validation happen above this trait.
/// Sends are fire-and-forget: success means the frame was handed to the
/// transport, not that the coordinator received it.
pub trait Channel: Send + Sync {
    /// Whether the transport is currently open.
    fn is_connected(&self) -> bool;

    /// Watch connection state changes.
    fn connection(&self) -> watch::Receiver<bool>;

    /// Hand a frame to the transport.
    ///
    /// # Errors
    /// Returns error if the transport refuses the frame.
    fn send(&self, frame: String) -> Result<(), ChannelError>;

    /// Register for inbound frames. Dropping the handle unsubscribes.
    fn subscribe(&self) -> Subscription;
}

/// Registration for inbound frames.
///
/// Unsubscribes exactly once, either through `unsubscribe` or on drop.
pub struct Subscription {
    frames: UnboundedReceiverStream<String>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a frame receiver with the hook that deregisters it.
    pub fn new(
        rx: mpsc::UnboundedReceiver<String>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            frames: UnboundedReceiverStream::new(rx),
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Next inbound frame, or `None` once the channel side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.frames.next().await
    }

    /// Deregister from the channel.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        Pin::new(&mut self.frames).poll_next(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.on_unsubscribe.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn test_unsubscribe_runs_hook_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();

        let counter = Arc::clone(&calls);
        let mut sub = Subscription::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send("hello".to_string()).unwrap();
        assert_eq!(sub.recv().await.as_deref(), Some("hello"));

        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(rx, || {});

        tx.send("a".to_string()).unwrap();
        drop(tx);

        assert_eq!(sub.next().await.as_deref(), Some("a"));
        assert_eq!(sub.next().await, None);
    }
}
