//! Bounded retry with exponential backoff around any [`Transport`].

use super::{HttpRequest, Method, RawResponse, Transport};
use crate::config::MigrationConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Which failures are retried, how often, and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (>= 1).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further one.
    pub backoff_base: Duration,
    /// Statuses treated as transient.
    pub retryable_statuses: HashSet<u16>,
    /// Methods that may be replayed.
    pub retryable_methods: HashSet<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            retryable_statuses: [429, 500, 502, 503, 504].into_iter().collect(),
            retryable_methods: Method::ALL.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
            retryable_statuses: config.retryable_statuses.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Delay before retry number `retry` (1-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }

    fn is_retryable(
        &self,
        method: Method,
        result: &Result<RawResponse, TransportError>,
    ) -> bool {
        if !self.retryable_methods.contains(&method) {
            return false;
        }
        match result {
            Ok(response) => self.retryable_statuses.contains(&response.status),
            Err(TransportError::Connection { .. }) => true,
            Err(TransportError::Timeout) => false,
        }
    }
}

/// Decorator that replays transient failures according to a [`RetryPolicy`].
///
/// When attempts run out the last response or error is returned as-is, so a
/// persistent 503 still reaches the caller as a 503.
#[derive(Debug, Clone)]
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let mut attempt = 1;
        loop {
            let result = self.inner.send(request.clone()).await;
            if attempt >= self.policy.max_attempts || !self.policy.is_retryable(request.method, &result) {
                return result;
            }

            let delay = self.policy.delay_for(attempt);
            let reason = match &result {
                Ok(response) => format!("HTTP {}", response.status),
                Err(e) => e.to_string(),
            };
            warn!(
                "{:?} {} failed ({}), retry {}/{} in {:?}",
                request.method,
                request.url.path(),
                reason,
                attempt,
                self.policy.max_attempts - 1,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
