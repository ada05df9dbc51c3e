use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Lifecycle events published by the manager.
///
/// Delivery is best effort: with no subscriber, or a lagging one, the
/// engine behaves exactly the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChunkEvent {
    /// First chunk of a batch was claimed
    ProcessingStart,
    /// Batch finished and nothing else is eligible
    ProcessingEnd,
    /// Number of dirty chunks changed
    QueueChange { dirty_count: usize },
    /// A leaf chunk received a fresh analysis
    ChunkProcessed { chunk_id: String },
    /// A leaf chunk failed (text unavailable or analyzer error)
    Error { chunk_id: String, message: String },
}

#[derive(Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ChunkEvent>,
    closed: AtomicBool,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tx,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ChunkEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ChunkEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(event);
    }

    /// Nothing is delivered after this
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
