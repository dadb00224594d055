//! Scripted transport double for unit tests.

use super::{Body, HttpRequest, Method, RawResponse, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// What the double saw for one call.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub form: Option<Vec<(String, String)>>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses in order; answers 404 once the queue is empty.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    seen: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: RawResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_status(&self, status: u16) {
        self.push_response(RawResponse::new(status, ""));
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push_response(RawResponse::new(status, body.to_string()));
    }

    pub fn push_error(&self, error: TransportError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let (json, form) = match request.body {
            Some(Body::Json(value)) => (Some(value), None),
            Some(Body::Form(fields)) => (None, Some(fields)),
            None => (None, None),
        };
        self.seen.lock().unwrap().push(RecordedRequest {
            method: request.method,
            path: request.url.path().to_string(),
            query: request.url.query().map(str::to_string),
            headers: request.headers,
            json,
            form,
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(404, "")))
    }
}
