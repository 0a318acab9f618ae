use reqwest::Client;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ENV_API_KEY;
use crate::error::{DeliveryError, DeliveryResult};
use crate::record::BatchPayload;

static MISSING_KEY_WARNED: AtomicBool = AtomicBool::new(false);

/// Where flushed batches go.
pub trait BatchSink: Send + Sync {
    fn deliver(&self, payload: &BatchPayload) -> impl Future<Output = DeliveryResult<()>> + Send;
}

/// POSTs each batch as JSON to the collector.
#[derive(Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl BatchSink for HttpSink {
    async fn deliver(&self, payload: &BatchPayload) -> DeliveryResult<()> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DeliveryError::Status { status: status.as_u16(), body });
        }

        debug!("Collector accepted {} records ({}): {}", payload.prompts.len(), status, body);
        Ok(())
    }
}

/// How the flush credential is obtained. Resolved on every flush, never cached.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Reads `RESULT_AI_API_KEY` from the process environment.
    Environment,
    Fixed(String),
}

impl Credentials {
    pub fn resolve(&self) -> String {
        match self {
            Credentials::Fixed(key) => key.clone(),
            Credentials::Environment => match std::env::var(ENV_API_KEY) {
                Ok(key) if !key.trim().is_empty() => key,
                _ => {
                    if !MISSING_KEY_WARNED.swap(true, Ordering::Relaxed) {
                        warn!("{} is not set; sending telemetry without a credential", ENV_API_KEY);
                    }
                    String::new()
                }
            },
        }
    }
}
