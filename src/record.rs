use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One completed intercepted call, in the collector's wire shape.
///
/// Records are built once by the interceptor and moved into the delivery
/// queue; nothing mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub record_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub function_patched: String,
    pub module_name_to_patch: String,
    pub root_module_name: String,
    pub timestamp: DateTime<Utc>,
    pub task_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub user_input_args: Map<String, Value>,
    pub request_data: RequestData,
    pub response_data: ResponseData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    pub llm_call_arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub success: bool,
    pub response: Value,
    /// Seconds.
    pub latency: f64,
}

/// Body of one flush request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub prompts: Vec<TelemetryRecord>,
    pub api_key: String,
}
