use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt::{Debug, Display};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::entry::Handler;
use super::target::InterceptionTarget;
use crate::context::TaskContext;
use crate::delivery::DeliveryQueue;
use crate::encode::{encode, Origin};
use crate::error::CaptureError;
use crate::record::{RequestData, ResponseData, TelemetryRecord};

/// Where finished calls are reported, plus the process-level fields every
/// record carries.
#[derive(Debug, Clone)]
pub struct CallRecorder {
    queue: DeliveryQueue,
    user_id: Option<String>,
}

impl CallRecorder {
    pub fn new(queue: DeliveryQueue) -> Self {
        Self { queue, user_id: None }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// State captured before delegating.
struct CallStart {
    timestamp: DateTime<Utc>,
    started: Instant,
    arguments: Value,
}

/// Wraps `original` so each successful call is timed and reported.
///
/// The wrapper returns exactly what `original` returns. Bookkeeping failures,
/// including panics inside user `Serialize`/`Debug` impls, are logged and
/// swallowed. If the pre-call step fails no record is produced for that call.
/// Errors from `original` produce no record at all.
pub fn intercept<A, R, E>(
    original: Handler<A, R, E>,
    target: InterceptionTarget,
    context: Arc<TaskContext>,
    recorder: CallRecorder,
) -> Handler<A, R, E>
where
    A: Serialize + Debug + 'static,
    R: Serialize + Debug + 'static,
    E: Display + 'static,
{
    Arc::new(move |args: A| -> Result<R, E> {
        let start = match guarded("pre-call", || begin(&args)) {
            Ok(start) => Some(start),
            Err(e) => {
                error!(
                    "Telemetry setup failed for {} (task '{}'): {}",
                    target, context.task_name, e
                );
                None
            }
        };

        debug!("Calling {} for task '{}'", target, context.task_name);
        let result = original(args);
        let finished = Instant::now();

        match &result {
            Ok(response) => {
                if let Some(start) = start {
                    let latency = finished.saturating_duration_since(start.started);
                    info!(
                        "{} completed in {:.3}s for task '{}'",
                        target,
                        latency.as_secs_f64(),
                        context.task_name
                    );
                    let outcome = guarded("post-call", || {
                        let record =
                            build_record(start, latency, response, &target, &context, &recorder);
                        recorder.queue.enqueue(record);
                    });
                    if let Err(e) = outcome {
                        error!(
                            "Telemetry capture failed for {} (task '{}'): {}",
                            target, context.task_name, e
                        );
                    }
                }
            }
            Err(e) => warn!(
                "{} failed for task '{}': {}; no telemetry recorded",
                target, context.task_name, e
            ),
        }

        result
    })
}

fn begin<A: Serialize + Debug>(args: &A) -> CallStart {
    let arguments = encode(args, Origin::Internal);
    // Latency covers the delegate only, not argument encoding.
    CallStart {
        timestamp: Utc::now(),
        started: Instant::now(),
        arguments,
    }
}

fn build_record<R: Serialize + Debug>(
    start: CallStart,
    latency: Duration,
    response: &R,
    target: &InterceptionTarget,
    context: &TaskContext,
    recorder: &CallRecorder,
) -> TelemetryRecord {
    TelemetryRecord {
        record_id: Uuid::new_v4(),
        user_id: recorder.user_id.clone(),
        function_patched: target.attribute().to_string(),
        module_name_to_patch: target.container().to_string(),
        root_module_name: target.root().to_string(),
        timestamp: start.timestamp,
        task_name: context.task_name.clone(),
        template: context.template.clone(),
        user_input_args: context.metadata.clone(),
        request_data: RequestData {
            llm_call_arguments: start.arguments,
        },
        response_data: ResponseData {
            success: true,
            response: encode(response, Origin::Internal),
            latency: latency.as_secs_f64(),
        },
    }
}

fn guarded<T>(stage: &'static str, step: impl FnOnce() -> T) -> Result<T, CaptureError> {
    panic::catch_unwind(AssertUnwindSafe(step)).map_err(|payload| CaptureError::Panicked {
        stage,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
