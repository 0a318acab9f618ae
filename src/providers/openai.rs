//! OpenAI chat completions as a patchable entry point.
//!
//! Application code calls [`create`]; whatever backend was handed to
//! [`bind`] does the actual work. Monitoring scopes swap that backend for an
//! interceptor while they are active.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::info;

use crate::error::PatchResult;
use crate::intercept::{EntryPoint, InterceptionTarget, LibraryCatalog, PatchPoint};

pub const ROOT: &str = "openai";
pub const CHAT_COMPLETIONS_CONTAINER: &str = "openai.resources.chat.completions.Completions";
pub const CHAT_COMPLETIONS_ATTRIBUTE: &str = "create";
pub const MIN_SUPPORTED_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("no chat completions backend is bound")]
    NotBound,

    #[error("chat completion failed: {0}")]
    Backend(String),
}

pub type ChatCompletions = EntryPoint<ChatCompletionRequest, ChatCompletion, OpenAiError>;

static CHAT_COMPLETIONS: OnceLock<Arc<ChatCompletions>> = OnceLock::new();

pub fn chat_completions_target() -> InterceptionTarget {
    InterceptionTarget::new(CHAT_COMPLETIONS_CONTAINER, CHAT_COMPLETIONS_ATTRIBUTE, ROOT)
        .with_min_version(MIN_SUPPORTED_VERSION)
}

/// The process-wide chat completions entry point.
pub fn chat_completions() -> Arc<ChatCompletions> {
    CHAT_COMPLETIONS
        .get_or_init(|| {
            Arc::new(EntryPoint::new(chat_completions_target(), |_| {
                Err(OpenAiError::NotBound)
            }))
        })
        .clone()
}

pub fn create(request: ChatCompletionRequest) -> Result<ChatCompletion, OpenAiError> {
    chat_completions().call(request)
}

/// Installs `handler` as the chat completions backend and registers the
/// client library version with the global catalog.
pub fn bind<F>(version: &str, handler: F) -> PatchResult<()>
where
    F: Fn(ChatCompletionRequest) -> Result<ChatCompletion, OpenAiError> + Send + Sync + 'static,
{
    bind_in(&LibraryCatalog::global(), version, handler)
}

pub fn bind_in<F>(catalog: &LibraryCatalog, version: &str, handler: F) -> PatchResult<()>
where
    F: Fn(ChatCompletionRequest) -> Result<ChatCompletion, OpenAiError> + Send + Sync + 'static,
{
    chat_completions().set_handler(handler)?;
    catalog.register(ROOT, version);
    info!("Bound {} backend at version {}", ROOT, version);
    Ok(())
}

/// The entry points a default monitoring scope patches.
pub fn supported_targets() -> Vec<Arc<dyn PatchPoint>> {
    let chat: Arc<dyn PatchPoint> = chat_completions();
    vec![chat]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_identity() {
        let target = chat_completions_target();
        assert_eq!(target.qualified_name(), "openai.resources.chat.completions.Completions.create");
        assert_eq!(target.root(), "openai");
        assert!(!target.supports("0.28.0"), "Pre-1.0 clients are not supported");
        assert!(target.supports("1.30.1"));
    }

    #[test]
    fn test_request_serialization_skips_unset_options() {
        let request = ChatCompletionRequest::new("gpt-3.5-turbo", vec![ChatMessage::user("Hello")]);
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "Hello"}]
            })
        );
    }
}
