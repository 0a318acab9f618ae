use std::time::Duration;
use tracing::warn;

pub const ENV_ENABLED: &str = "RESULT_AI_ENABLED";
pub const ENV_API_KEY: &str = "RESULT_AI_API_KEY";
pub const ENV_ENDPOINT: &str = "RESULT_AI_ENDPOINT";
pub const ENV_USER_ID: &str = "RESULT_AI_USER_ID";
pub const ENV_BATCH_SIZE: &str = "RESULT_AI_BATCH_SIZE";
pub const ENV_MAX_BATCH_AGE_MS: &str = "RESULT_AI_MAX_BATCH_AGE_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "RESULT_AI_POLL_INTERVAL_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "RESULT_AI_REQUEST_TIMEOUT_SECS";

pub const DEFAULT_ENDPOINT: &str = "https://41aqa6x62g.execute-api.us-east-1.amazonaws.com/prompts";
pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const DEFAULT_MAX_BATCH_AGE: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide settings for the monitoring layer.
///
/// The enable flag and user id are not stored here; scopes re-read them on
/// every entry through [`monitoring_enabled`] and [`configured_user_id`]. The
/// API key is resolved on every flush (see [`crate::delivery::Credentials`]).
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub batch_size: usize,
    pub max_batch_age: Duration,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_batch_age: DEFAULT_MAX_BATCH_AGE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through an arbitrary lookup. Missing keys keep their
    /// defaults; unparsable numbers are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            settings.endpoint = endpoint.trim().to_string();
        }

        if let Some(size) = parse_number(&lookup, ENV_BATCH_SIZE) {
            settings.batch_size = (size as usize).max(1);
        }
        if let Some(ms) = parse_number(&lookup, ENV_MAX_BATCH_AGE_MS) {
            settings.max_batch_age = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_number(&lookup, ENV_POLL_INTERVAL_MS) {
            settings.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_number(&lookup, ENV_REQUEST_TIMEOUT_SECS) {
            settings.request_timeout = Duration::from_secs(secs);
        }

        settings
    }
}

/// Re-reads the global enable flag. Scopes call this on every entry so the
/// switch takes effect without touching call sites.
pub fn monitoring_enabled() -> bool {
    enabled_from(|key| std::env::var(key).ok())
}

/// Re-reads the user id attached to every record.
pub fn configured_user_id() -> Option<String> {
    user_id_from(|key| std::env::var(key).ok())
}

fn enabled_from<F: Fn(&str) -> Option<String>>(lookup: F) -> bool {
    lookup(ENV_ENABLED).map_or(true, |raw| is_truthy(&raw))
}

fn user_id_from<F: Fn(&str) -> Option<String>>(lookup: F) -> Option<String> {
    lookup(ENV_USER_ID)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn is_truthy(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn parse_number<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}
