use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use super::queue::QueueDrain;
use super::sink::{BatchSink, Credentials};
use crate::config::Settings;
use crate::record::{BatchPayload, TelemetryRecord};

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub batch_size: usize,
    pub max_batch_age: Duration,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig::from(&Settings::default())
    }
}

impl From<&Settings> for WorkerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            max_batch_age: settings.max_batch_age,
            poll_interval: settings.poll_interval,
        }
    }
}

/// Drains the delivery queue, groups records, and ships them through a sink.
///
/// A batch goes out when it reaches `batch_size` or when `max_batch_age` has
/// passed since the previous flush, whichever comes first. Failed flushes are
/// logged and the batch is dropped.
pub struct BatchingWorker<S> {
    drain: QueueDrain,
    sink: S,
    credentials: Credentials,
    config: WorkerConfig,
    batch: Vec<TelemetryRecord>,
    last_flush: Instant,
}

impl<S: BatchSink> BatchingWorker<S> {
    pub fn new(drain: QueueDrain, sink: S, credentials: Credentials, config: WorkerConfig) -> Self {
        Self {
            drain,
            sink,
            credentials,
            config,
            batch: Vec::with_capacity(config.batch_size),
            last_flush: Instant::now(),
        }
    }

    /// Polls until every producer is gone. The process-wide queue never
    /// closes, so in practice the global worker runs forever.
    pub async fn run(mut self) {
        info!(
            "Queue worker started (batch size {}, max age {:?})",
            self.config.batch_size, self.config.max_batch_age
        );
        self.last_flush = Instant::now();

        loop {
            let drained = self.drain.drain_available();
            let idle = drained.is_empty();

            for record in drained {
                debug!("Batching record {} for task '{}'", record.record_id, record.task_name);
                self.batch.push(record);
                if self.batch.len() >= self.config.batch_size || self.batch_expired() {
                    self.flush().await;
                }
            }

            // A partial batch still goes out once it is old enough.
            if !self.batch.is_empty() && self.batch_expired() {
                self.flush().await;
            }

            if self.drain.is_closed() {
                if !self.batch.is_empty() {
                    self.flush().await;
                }
                info!("Queue closed; worker stopping");
                return;
            }

            if idle {
                sleep(self.config.poll_interval).await;
            }
        }
    }

    fn batch_expired(&self) -> bool {
        self.last_flush.elapsed() >= self.config.max_batch_age
    }

    async fn flush(&mut self) {
        let prompts = std::mem::take(&mut self.batch);
        let count = prompts.len();
        let payload = BatchPayload {
            prompts,
            api_key: self.credentials.resolve(),
        };

        debug!("Sending batch of {} records", count);
        match self.sink.deliver(&payload).await {
            Ok(()) => debug!("Batch of {} records sent", count),
            Err(e) => error!("Error sending batch of {} records (dropped): {}", count, e),
        }
        self.last_flush = Instant::now();
    }
}
