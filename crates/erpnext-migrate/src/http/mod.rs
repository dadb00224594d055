//! HTTP session: a timeout-bounded transport plus a retrying decorator.
//!
//! - [`Transport`]: one request in, one raw response (or transport failure) out
//! - [`ReqwestTransport`]: the network implementation, with a fixed timeout
//! - [`RetryingTransport`]: wraps any transport with bounded retry/backoff
//!
//! Response bodies are handed back untouched and never logged here.

mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub use retry::{RetryPolicy, RetryingTransport};

use crate::error::{ApiError, MigrateError, Result, TransportError};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP methods used against the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request payload.
#[derive(Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A fully built request.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(Body::Form(fields));
        self
    }
}

// Headers and bodies carry credentials; only method and path are printable.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.url.path())
            .finish_non_exhaustive()
    }
}

/// Status, headers, and body text of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// All values of a header, matched case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body; a body that does not fit `T` is a malformed response.
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|_| ApiError::MalformedResponse)
    }
}

/// Sends one request and returns the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> std::result::Result<RawResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Network transport backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose every call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| MigrateError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<RawResponse, TransportError> {
        debug!("{:?} {}", request.method, request.url.path());

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| classify_reqwest(&e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.text().await.map_err(|e| classify_reqwest(&e))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Reduce a reqwest error to a type label; its message may contain the URL.
fn classify_reqwest(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::connection("Connect")
    } else if err.is_redirect() {
        TransportError::connection("Redirect")
    } else if err.is_body() || err.is_decode() {
        TransportError::connection("Body")
    } else if err.is_request() {
        TransportError::connection("Request")
    } else {
        TransportError::connection("Other")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values_case_insensitive() {
        let response = RawResponse::new(200, "")
            .with_header("Set-Cookie", "sid=abc; Path=/")
            .with_header("set-cookie", "system_user=yes")
            .with_header("Content-Type", "application/json");
        let cookies: Vec<&str> = response.header_values("set-cookie").collect();
        assert_eq!(cookies, vec!["sid=abc; Path=/", "system_user=yes"]);
    }

    #[test]
    fn test_json_malformed() {
        let response = RawResponse::new(200, "<html>proxy error</html>");
        let parsed: std::result::Result<Value, ApiError> = response.json();
        assert_eq!(parsed, Err(ApiError::MalformedResponse));
    }

    #[test]
    fn test_request_debug_hides_body() {
        let url = Url::parse("https://erp.example.com/api/method/login").unwrap();
        let request = HttpRequest::new(Method::Post, url)
            .header("Authorization", "token key:secret")
            .form(vec![("pwd".into(), "hunter2".into())]);
        let debug = format!("{:?}", request);
        assert!(debug.contains("/api/method/login"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(30)).is_ok());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // The kernel completes the handshake from the backlog; nothing ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = Url::parse(&format!("http://{}/api/resource/Item/SKU-1", listener.local_addr().unwrap())).unwrap();

        let transport = ReqwestTransport::new(Duration::from_millis(300)).unwrap();
        let started = std::time::Instant::now();
        let result = transport.send(HttpRequest::new(Method::Get, url)).await;

        assert_eq!(result.unwrap_err(), TransportError::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let url = Url::parse(&format!("http://{}/api/method/login", addr)).unwrap();

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let err = transport
            .send(HttpRequest::new(Method::Post, url))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::connection("Connect"));
    }
}
