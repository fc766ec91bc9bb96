//! In-process transport bridge.
//!
//! `BridgeChannel` is the client side and implements `Channel`. `RemoteEnd` is
//! the coordinator side: it controls connection state, pushes server messages
//! to every subscriber and receives what the client sends.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use pomodoro_sync_core::{Channel, ChannelError, Subscription};
use tokio::sync::{mpsc, watch};

use crate::protocol::{ClientMessage, ProtocolError, ServerMessage};

struct Shared {
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
    connected: watch::Sender<bool>,
}

impl Shared {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<String>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Client side of the bridge.
#[derive(Clone)]
pub struct BridgeChannel {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<String>,
}

impl BridgeChannel {
    /// Create a new bridge, initially disconnected.
    ///
    /// Returns the client channel and the coordinator side.
    #[must_use]
    pub fn new() -> (Self, RemoteEnd) {
        let (outbound, inbound) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            connected,
        });

        let channel = Self {
            shared: Arc::clone(&shared),
            outbound,
        };

        let remote = RemoteEnd { shared, inbound };

        (channel, remote)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers().len()
    }
}

impl Channel for BridgeChannel {
    fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    fn connection(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    fn send(&self, frame: String) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Closed);
        }
        self.outbound.send(frame).map_err(|_| ChannelError::Closed)
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.subscribers().insert(id, tx);

        let shared = Arc::downgrade(&self.shared);
        Subscription::new(rx, move || {
            if let Some(shared) = shared.upgrade() {
                shared.subscribers().remove(&id);
            }
        })
    }
}

/// Coordinator side of the bridge.
pub struct RemoteEnd {
    shared: Arc<Shared>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl RemoteEnd {
    /// Mark the transport open.
    pub fn connect(&self) {
        self.shared.connected.send_replace(true);
    }

    /// Mark the transport closed.
    pub fn disconnect(&self) {
        self.shared.connected.send_replace(false);
    }

    /// Push a server message to every subscriber.
    ///
    /// Returns the number of subscribers it was delivered to.
    ///
    /// # Errors
    /// Returns error if the message cannot be serialized.
    pub fn push(&self, msg: &ServerMessage) -> Result<usize, ProtocolError> {
        let frame = serde_json::to_string(msg)?;
        Ok(self.push_raw(frame))
    }

    /// Push a raw text frame to every subscriber.
    pub fn push_raw(&self, frame: impl Into<String>) -> usize {
        let frame = frame.into();
        let mut subscribers = self.shared.subscribers();
        subscribers.retain(|_, tx| tx.send(frame.clone()).is_ok());
        subscribers.len()
    }

    /// Receive the next client message.
    ///
    /// Frames that do not decode are logged and skipped.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        while let Some(frame) = self.inbound.recv().await {
            if let Some(msg) = Self::parse(&frame) {
                return Some(msg);
            }
        }
        None
    }

    /// Receive a client message (non-blocking).
    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        while let Ok(frame) = self.inbound.try_recv() {
            if let Some(msg) = Self::parse(&frame) {
                return Some(msg);
            }
        }
        None
    }

    /// Take every client message received so far.
    pub fn drain(&mut self) -> Vec<ClientMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    fn parse(frame: &str) -> Option<ClientMessage> {
        match serde_json::from_str(frame) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!("Invalid client message: {e}");
                None
            }
        }
    }
}

impl Drop for RemoteEnd {
    fn drop(&mut self) {
        self.shared.connected.send_replace(false);
        self.shared.subscribers().clear();
    }
}

#[cfg(test)]
mod tests {
    use pomodoro_sync_core::PresetType;

    use super::*;

    #[test]
    fn test_send_requires_connection() {
        let (channel, mut remote) = BridgeChannel::new();
        assert!(!channel.is_connected());
        assert!(matches!(
            channel.send("{\"type\":\"pause\"}".to_string()),
            Err(ChannelError::Closed)
        ));
        assert!(remote.try_recv().is_none());

        remote.connect();
        channel.send("{\"type\":\"pause\"}".to_string()).unwrap();
        assert_eq!(remote.try_recv(), Some(ClientMessage::Pause));
    }

    #[tokio::test]
    async fn test_push_reaches_each_subscriber() {
        let (channel, remote) = BridgeChannel::new();
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();

        let delivered = remote.push(&ServerMessage::TimerStopped).unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(first.recv().await.as_deref(), Some("{\"type\":\"timer_stopped\"}"));
        assert_eq!(second.recv().await.as_deref(), Some("{\"type\":\"timer_stopped\"}"));
    }

    #[test]
    fn test_unsubscribe_removes_handler() {
        let (channel, remote) = BridgeChannel::new();
        let sub = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(remote.push_raw("{}"), 0);
    }

    #[test]
    fn test_connection_watch_follows_remote() {
        let (channel, remote) = BridgeChannel::new();
        let mut watch = channel.connection();
        assert!(!*watch.borrow_and_update());

        remote.connect();
        assert!(watch.has_changed().unwrap());
        assert!(*watch.borrow_and_update());

        drop(remote);
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_drain_skips_garbage() {
        let (channel, mut remote) = BridgeChannel::new();
        remote.connect();
        channel.send("garbage".to_string()).unwrap();
        channel
            .send("{\"type\":\"sync_request\",\"preset_type\":\"short\"}".to_string())
            .unwrap();
        channel.send("{\"type\":\"stop\"}".to_string()).unwrap();

        assert_eq!(
            remote.drain(),
            vec![
                ClientMessage::SyncRequest {
                    preset_type: PresetType::Short
                },
                ClientMessage::Stop
            ]
        );
    }

    #[tokio::test]
    async fn test_recv_waits_for_client() {
        let (channel, mut remote) = BridgeChannel::new();
        remote.connect();

        let mut pending = tokio_test::task::spawn(remote.recv());
        tokio_test::assert_pending!(pending.poll());

        channel.send("{\"type\":\"resume\"}".to_string()).unwrap();
        assert!(pending.is_woken());
        tokio_test::assert_ready_eq!(pending.poll(), Some(ClientMessage::Resume));
    }
}
