//! Error types for patching, capture bookkeeping and delivery.
//!
//! None of these ever reach the caller of an instrumented function. They
//! surface in logs, in `ExitReport`s and in the worker's flush results.

use thiserror::Error;

/// Failures while swapping an entry point in or out.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("entry point lock poisoned for {target}")]
    Poisoned { target: String },

    #[error("{target} is not patched by this scope")]
    NotPatched { target: String },

    #[error("failed to restore {target}: {reason}")]
    Restore { target: String, reason: String },
}

/// Failures inside the interceptor's own bookkeeping.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{stage} bookkeeping panicked: {message}")]
    Panicked { stage: &'static str, message: String },
}

/// Failures while shipping a batch to the collector.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector returned {status}: {body}")]
    Status { status: u16, body: String },
}

pub type PatchResult<T> = Result<T, PatchError>;
pub type DeliveryResult<T> = Result<T, DeliveryError>;
