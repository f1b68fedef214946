//! In-process subscriber registry backed by a tokio broadcast channel.

use crate::publisher::Broadcaster;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// One broadcast, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event: String,
    pub payload: Value,
}

/// Subscribers that connect after a broadcast never see it, and a subscriber
/// that falls more than `capacity` notifications behind skips the gap.
#[derive(Clone)]
pub struct SubscriberHub {
    tx: broadcast::Sender<Notification>,
    connected: Arc<AtomicUsize>,
}

impl SubscriberHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            connected: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self, peer: impl Into<String>) -> Subscription {
        let peer = peer.into();
        let count = self.connected.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(subscriber.peer = %peer, subscribers = count, "Subscriber connected");

        Subscription {
            rx: self.tx.subscribe(),
            connected: self.connected.clone(),
            peer,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Broadcaster for SubscriberHub {
    fn broadcast(&self, event: &str, payload: Value) {
        let notification = Notification {
            event: event.to_string(),
            payload,
        };
        match self.tx.send(notification) {
            Ok(receivers) => tracing::trace!(event, receivers, "Broadcast sent"),
            Err(_) => tracing::debug!(event, "Broadcast dropped, no subscribers"),
        }
    }
}

/// A live subscription. Dropping it counts as a disconnect.
pub struct Subscription {
    rx: broadcast::Receiver<Notification>,
    connected: Arc<AtomicUsize>,
    peer: String,
}

impl Subscription {
    /// Next notification, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(subscriber.peer = %self.peer, missed, "Subscriber lagged, skipping");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.try_recv() {
                Ok(notification) => return Some(notification),
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(subscriber.peer = %self.peer, missed, "Subscriber lagged, skipping");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.connected.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        tracing::info!(subscriber.peer = %self.peer, subscribers = remaining, "Subscriber disconnected");
    }
}
