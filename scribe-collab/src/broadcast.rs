//! Per-connection outbound queues with backpressure.
//!
//! Every live connection owns a bounded mpsc queue drained by its socket
//! writer. Delivery never blocks. A full queue drops the frame and evicts
//! that connection: its queue is closed, so the writer ends once it drains,
//! and the caller is told to run the disconnect path for it. A client that
//! missed an event never stays present with a stale view.
//!
//! Each outbound event is serialised once and shared across recipients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use scribe_core::ConnectionId;

use crate::coordinator::{Coordinator, Delivery, Target};
use crate::protocol::ProtocolError;

/// Encoded frame shared by every recipient of one event.
pub type Frame = Arc<String>;

/// Snapshot of hub counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub evictions: u64,
    pub connections: usize,
}

struct AtomicHubStats {
    messages_sent: AtomicU64,
    messages_dropped: AtomicU64,
    evictions: AtomicU64,
}

/// Result of one [`ConnectionHub::deliver`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivered {
    /// Frames queued across all recipients.
    pub queued: usize,
    /// Connections whose queue overflowed, in overflow order. They are
    /// already unregistered; their presence still has to be cleared.
    pub evicted: Vec<ConnectionId>,
}

enum Enqueue {
    Queued,
    Full,
    Closed,
}

pub struct ConnectionHub {
    queues: RwLock<HashMap<ConnectionId, mpsc::Sender<Frame>>>,
    capacity: usize,
    stats: AtomicHubStats,
}

impl ConnectionHub {
    /// `capacity` frames are buffered per connection before drops start.
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            stats: AtomicHubStats {
                messages_sent: AtomicU64::new(0),
                messages_dropped: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            },
        }
    }

    /// Open a queue for `id`. Re-registering replaces the old queue.
    pub async fn register(&self, id: ConnectionId) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.queues.write().await.insert(id, tx);
        rx
    }

    /// Close the queue; the writer sees end-of-stream once it drains.
    pub async fn unregister(&self, id: &ConnectionId) -> bool {
        self.queues.write().await.remove(id).is_some()
    }

    /// Queue one pre-encoded frame for a single connection. An overflow
    /// evicts the connection and returns `false`.
    pub async fn send_to(&self, id: &ConnectionId, frame: Frame) -> bool {
        let outcome = {
            let queues = self.queues.read().await;
            match queues.get(id) {
                Some(tx) => self.try_enqueue(id, tx, frame),
                None => return false,
            }
        };
        match outcome {
            Enqueue::Queued => true,
            Enqueue::Full => {
                self.evict(std::slice::from_ref(id)).await;
                false
            }
            Enqueue::Closed => false,
        }
    }

    /// Encode each delivery once, resolve its recipients against the
    /// coordinator's presence, and enqueue.
    ///
    /// Recipients without a queue (already disconnected) are skipped
    /// silently. A recipient whose queue overflows gets nothing further
    /// from this call and is reported in [`Delivered::evicted`].
    pub async fn deliver(
        &self,
        coordinator: &Coordinator,
        deliveries: Vec<Delivery>,
    ) -> Result<Delivered, ProtocolError> {
        let mut delivered = Delivered::default();
        if deliveries.is_empty() {
            return Ok(delivered);
        }

        let encoded = deliveries
            .into_iter()
            .map(|delivery| Ok((delivery.target, Arc::new(delivery.event.encode()?))))
            .collect::<Result<Vec<(Target, Frame)>, ProtocolError>>()?;

        {
            let queues = self.queues.read().await;
            for (target, frame) in encoded {
                for id in coordinator.recipients(&target) {
                    if delivered.evicted.contains(&id) {
                        self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let Some(tx) = queues.get(&id) else {
                        continue;
                    };
                    match self.try_enqueue(&id, tx, frame.clone()) {
                        Enqueue::Queued => delivered.queued += 1,
                        Enqueue::Full => delivered.evicted.push(id),
                        Enqueue::Closed => {}
                    }
                }
            }
        }

        self.evict(&delivered.evicted).await;
        Ok(delivered)
    }

    fn try_enqueue(&self, id: &ConnectionId, tx: &mpsc::Sender<Frame>, frame: Frame) -> Enqueue {
        match tx.try_send(frame) {
            Ok(()) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                Enqueue::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Outbound queue full for {id}, evicting connection");
                Enqueue::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::trace!("Queue for {id} already closed");
                Enqueue::Closed
            }
        }
    }

    async fn evict(&self, ids: &[ConnectionId]) {
        if ids.is_empty() {
            return;
        }
        let mut queues = self.queues.write().await;
        for id in ids {
            if queues.remove(id).is_some() {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.queues.read().await.len()
    }

    pub async fn is_registered(&self, id: &ConnectionId) -> bool {
        self.queues.read().await.contains_key(id)
    }

    pub async fn stats(&self) -> HubStats {
        HubStats {
            messages_sent: self.stats.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.stats.messages_dropped.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            connections: self.connection_count().await,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
