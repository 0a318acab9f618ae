//! Asynchronous telemetry delivery.
//!
//! Interceptors push records into a [`DeliveryQueue`]; one [`BatchingWorker`]
//! per process drains it and talks to the collector. Network I/O never
//! happens on a caller's thread.

pub mod queue;
pub mod sink;
pub mod worker;

pub use queue::{DeliveryQueue, QueueDrain};
pub use sink::{BatchSink, Credentials, HttpSink};
pub use worker::{BatchingWorker, WorkerConfig};

use std::sync::OnceLock;
use tracing::{error, info};

use crate::config::Settings;

const WORKER_THREAD_NAME: &str = "result-ai-delivery";

static GLOBAL_QUEUE: OnceLock<DeliveryQueue> = OnceLock::new();

/// The process-wide queue. The first call starts the background worker.
pub fn global_queue() -> DeliveryQueue {
    GLOBAL_QUEUE.get_or_init(start_worker).clone()
}

/// Starts the process-wide worker if it isn't running yet. Idempotent.
pub fn start() {
    let _ = global_queue();
}

pub fn is_started() -> bool {
    GLOBAL_QUEUE.get().is_some()
}

fn start_worker() -> DeliveryQueue {
    let settings = Settings::from_env();
    let (queue, drain) = DeliveryQueue::new();

    // Own thread + own runtime: works whether or not the host runs tokio.
    let spawned = std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to build delivery runtime: {}", e);
                    return;
                }
            };
            let sink = HttpSink::new(settings.endpoint.clone(), settings.request_timeout);
            info!("Delivering telemetry to {}", sink.endpoint());
            let worker = BatchingWorker::new(
                drain,
                sink,
                Credentials::Environment,
                WorkerConfig::from(&settings),
            );
            runtime.block_on(worker.run());
        });

    if let Err(e) = spawned {
        error!("Failed to start delivery worker: {}", e);
    }
    queue
}
