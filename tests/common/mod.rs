#![allow(dead_code)]

use chrono::Utc;
use result_ai::delivery::BatchSink;
use result_ai::error::{DeliveryError, DeliveryResult};
use result_ai::record::{BatchPayload, RequestData, ResponseData, TelemetryRecord};
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use uuid::Uuid;

pub fn record(task: &str) -> TelemetryRecord {
    TelemetryRecord {
        record_id: Uuid::new_v4(),
        user_id: None,
        function_patched: "create".into(),
        module_name_to_patch: "test.Completions".into(),
        root_module_name: "test".into(),
        timestamp: Utc::now(),
        task_name: task.into(),
        template: None,
        user_input_args: Map::new(),
        request_data: RequestData { llm_call_arguments: json!({"prompt": task}) },
        response_data: ResponseData { success: true, response: json!("ok"), latency: 0.01 },
    }
}

/// Keeps every payload it is handed. Optionally fails the first N deliveries.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub batches: Arc<Mutex<Vec<BatchPayload>>>,
    attempts: Arc<AtomicUsize>,
    fail_first: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(n: usize) -> Self {
        Self { fail_first: n, ..Self::default() }
    }

    pub fn batches(&self) -> Vec<BatchPayload> {
        self.batches.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered_tasks(&self) -> Vec<Vec<String>> {
        self.batches()
            .iter()
            .map(|b| b.prompts.iter().map(|r| r.task_name.clone()).collect())
            .collect()
    }
}

impl BatchSink for RecordingSink {
    async fn deliver(&self, payload: &BatchPayload) -> DeliveryResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(DeliveryError::Status { status: 503, body: "unavailable".into() });
        }
        self.batches.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// A throwaway HTTP collector on localhost. Every request body is forwarded
/// on the returned channel and answered with `status`.
pub async fn spawn_collector(status: u16) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(body) = read_request_body(&mut socket).await {
                    let _ = tx.send(body);
                }
                let response = format!(
                    "HTTP/1.1 {} Collector\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}/prompts", addr), rx)
}

/// Accepts connections and never answers.
pub async fn spawn_silent_collector() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{}/prompts", addr)
}

async fn read_request_body(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(String::from_utf8_lossy(&buf[header_end..]).to_string())
}
