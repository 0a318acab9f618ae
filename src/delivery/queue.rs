use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::record::TelemetryRecord;

/// Producer side of the telemetry mailbox. Cheap to clone; every scope and
/// interceptor holds one.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<TelemetryRecord>,
    pending: Arc<AtomicUsize>,
}

/// Consumer side. Exactly one exists per queue and the batching worker owns it.
#[derive(Debug)]
pub struct QueueDrain {
    rx: mpsc::UnboundedReceiver<TelemetryRecord>,
    pending: Arc<AtomicUsize>,
    closed: bool,
}

impl DeliveryQueue {
    pub fn new() -> (DeliveryQueue, QueueDrain) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            DeliveryQueue { tx, pending: pending.clone() },
            QueueDrain { rx, pending, closed: false },
        )
    }

    /// Appends a record. Never blocks; if the consumer is gone the record is
    /// dropped with a warning.
    pub fn enqueue(&self, record: TelemetryRecord) {
        let task = record.task_name.clone();
        // Counted before the send so the consumer never subtracts first.
        let size = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        match self.tx.send(record) {
            Ok(()) => debug!("Queued record for task '{}'. Queue size: {}", task, size),
            Err(_) => {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                warn!("Delivery worker is gone; dropping record for task '{}'", task);
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn same_queue(&self, other: &DeliveryQueue) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl QueueDrain {
    /// Everything currently queued, oldest first. Never waits.
    pub fn drain_available(&mut self) -> Vec<TelemetryRecord> {
        let mut drained = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(record) => drained.push(record),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        if !drained.is_empty() {
            self.pending.fetch_sub(drained.len(), Ordering::Relaxed);
        }
        drained
    }

    /// True once every producer has been dropped and the channel is empty.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
