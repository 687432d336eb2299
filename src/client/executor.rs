//! Request executor - one logical call with retries, backoff and timeouts.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::Result;

use super::transport::{HttpRequest, ReqwestTransport, Transport};

/// Exponential backoff with a ceiling and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            retries: config.retries,
            backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay after the failed attempt with 0-based index `attempt`:
    /// `min(backoff * 2^attempt, max_backoff)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base.saturating_mul(factor));
        delay.min(self.max_backoff)
    }
}

/// Per-call overrides.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HashMap::new(),
        }
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Performs HTTP calls against one server with bounded retries.
pub struct RequestExecutor<T: Transport = ReqwestTransport> {
    transport: T,
    base_url: String,
    headers: HeaderMap,
    policy: RetryPolicy,
    timeout: Duration,
}

impl RequestExecutor<ReqwestTransport> {
    /// Create an executor backed by `reqwest`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_transport(config, ReqwestTransport::new()?)
    }
}

impl<T: Transport> RequestExecutor<T> {
    /// Create an executor over a custom transport.
    ///
    /// Validates the config and resolves the default headers once.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        merge_headers(&mut headers, &config.headers)?;

        Ok(Self {
            transport,
            base_url: config.base_url().to_string(),
            headers,
            policy: RetryPolicy::from_config(config),
            timeout: config.timeout(),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Absolute URL for `endpoint`, appended verbatim.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Run one logical request and decode the JSON body.
    ///
    /// Retryable failures (see [`Error::is_retryable`]) are retried until
    /// the attempts run out; the last one comes back wrapped in
    /// [`Error::Exhausted`]. Any other failure is returned as is.
    pub async fn execute<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<R> {
        let mut headers = self.headers.clone();
        merge_headers(&mut headers, &options.headers)?;

        let request = HttpRequest {
            method: options.method,
            url: self.url(endpoint),
            headers,
            body: options.body.as_ref().map(Value::to_string),
        };

        let attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            debug!("{} {} (attempt {}/{})", request.method, request.url, attempt + 1, attempts);

            let error = match self.attempt(&request).await {
                Ok(parsed) => return Ok(parsed),
                Err(e) => e,
            };

            if !error.is_retryable() {
                warn!("Request to {} failed permanently: {}", request.url, error);
                return Err(error);
            }

            if attempt + 1 >= attempts {
                return Err(Error::Exhausted {
                    attempts,
                    source: Box::new(error),
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!(
                "Request failed (attempt {}/{}), retrying in {}ms: {}",
                attempt + 1,
                attempts,
                delay.as_millis(),
                error
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt<R: DeserializeOwned>(&self, request: &HttpRequest) -> Result<R> {
        // Dropping the send future on timeout aborts the in-flight request.
        let response = tokio::time::timeout(self.timeout, self.transport.send(request.clone()))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        if !response.is_success() {
            return Err(Error::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }

        serde_json::from_str(&response.body)
            .map_err(|e| Error::Parse(format!("Invalid JSON from {}: {}", request.url, e)))
    }
}

/// Insert `overrides` into `headers`, replacing same-named entries.
fn merge_headers(headers: &mut HeaderMap, overrides: &HashMap<String, String>) -> Result<()> {
    for (name, value) in overrides {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("Invalid value for header {}: {}", name, e)))?;
        headers.insert(name, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::{Outcome, ScriptedTransport};
    use serde_json::json;

    fn config(retries: u32) -> ClientConfig {
        ClientConfig::new("http://agents.test")
            .with_retries(retries)
            .with_backoff_ms(300, 5000)
            .with_timeout_ms(1000)
    }

    fn executor(config: &ClientConfig, transport: &ScriptedTransport) -> RequestExecutor<ScriptedTransport> {
        RequestExecutor::with_transport(config, transport.clone()).unwrap()
    }

    fn gaps(transport: &ScriptedTransport) -> Vec<u128> {
        transport
            .sent_at()
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect()
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::from_config(&config(3));
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(0), Duration::from_millis(300));
        assert_eq!(policy.delay_for(1), Duration::from_millis(600));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1200));
    }

    #[test]
    fn test_backoff_ceiling() {
        let policy = RetryPolicy::from_config(&config(10));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(63), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_retries_plus_one() {
        let transport = ScriptedTransport::new(vec![]);
        let exec = executor(&config(3), &transport);

        let result: Result<Value> = exec.execute("/api/health", RequestOptions::get()).await;

        match result {
            Err(Error::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, Error::Transport(_)));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        assert_eq!(transport.attempts(), 4);
        assert_eq!(gaps(&transport), vec![300, 600, 1200]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_single_attempt() {
        let transport = ScriptedTransport::new(vec![]);
        let exec = executor(&config(0), &transport);
        let start = tokio::time::Instant::now();

        let result: Result<Value> = exec.execute("/api/health", RequestOptions::get()).await;

        assert!(matches!(result, Err(Error::Exhausted { attempts: 1, .. })));
        assert_eq!(transport.attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_short_circuits() {
        let transport = ScriptedTransport::new(vec![
            Outcome::Fail("reset by peer".to_string()),
            Outcome::Respond(502, "bad gateway".to_string()),
            Outcome::Respond(200, json!({"status": "ok"}).to_string()),
            Outcome::Respond(200, json!({"status": "unused"}).to_string()),
        ]);
        let exec = executor(&config(5), &transport);
        let start = tokio::time::Instant::now();

        let value: Value = exec.execute("/api/health", RequestOptions::get()).await.unwrap();

        assert_eq!(value["status"], "ok");
        assert_eq!(transport.attempts(), 3);
        assert_eq!(gaps(&transport), vec![300, 600]);
        assert_eq!(start.elapsed().as_millis(), 900);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_attempt_and_retries() {
        let transport = ScriptedTransport::new(vec![
            Outcome::Hang,
            Outcome::Respond(200, json!({"ok": true}).to_string()),
        ]);
        let exec = executor(&config(1), &transport);

        let value: Value = exec.execute("/api/health", RequestOptions::get()).await.unwrap();

        assert_eq!(value["ok"], true);
        // 1000ms timeout then 300ms backoff
        assert_eq!(gaps(&transport), vec![1300]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exhausted() {
        let transport = ScriptedTransport::new(vec![Outcome::Hang]);
        let exec = executor(&config(0), &transport);
        let start = tokio::time::Instant::now();

        let err = exec
            .execute::<Value>("/api/health", RequestOptions::get())
            .await
            .unwrap_err();

        assert!(matches!(err.last_failure(), Error::Timeout(d) if *d == Duration::from_millis(1000)));
        assert_eq!(start.elapsed().as_millis(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_retried() {
        let transport = ScriptedTransport::new(vec![
            Outcome::Respond(404, "no such agent".to_string()),
            Outcome::Respond(404, "no such agent".to_string()),
        ]);
        let exec = executor(&config(1), &transport);

        let err = exec
            .execute::<Value>("/api/agents/missing/generate", RequestOptions::post(json!({})))
            .await
            .unwrap_err();

        assert_eq!(transport.attempts(), 2);
        match err.last_failure() {
            Error::HttpStatus { status, body } => {
                assert_eq!(*status, 404);
                assert_eq!(body, "no such agent");
            }
            other => panic!("Expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_failure_is_retried() {
        let transport = ScriptedTransport::new(vec![
            Outcome::Respond(200, "<html>proxy login</html>".to_string()),
            Outcome::Respond(200, json!({"agents": []}).to_string()),
        ]);
        let exec = executor(&config(2), &transport);

        let value: Value = exec.execute("/api/agents", RequestOptions::get()).await.unwrap();

        assert_eq!(value, json!({"agents": []}));
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsendable_request_is_not_retried() {
        let transport = ScriptedTransport::new(vec![
            Outcome::Invalid("relative URL without a base".to_string()),
            Outcome::Respond(200, json!({}).to_string()),
        ]);
        let exec = executor(&config(3), &transport);
        let start = tokio::time::Instant::now();

        let result: Result<Value> = exec.execute("/api/health", RequestOptions::get()).await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(transport.attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_header_merge() {
        let transport = ScriptedTransport::ok(vec![json!({})]);
        let config = config(0)
            .with_header("X-Tenant", "config")
            .with_header("X-Team", "core");
        let exec = executor(&config, &transport);

        let options = RequestOptions::get()
            .with_header("x-tenant", "call")
            .with_header("X-Trace", "abc");
        let _: Value = exec.execute("/api/agents", options).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.headers.get("x-tenant").unwrap(), "call");
        assert_eq!(sent.headers.get_all("x-tenant").iter().count(), 1);
        assert_eq!(sent.headers.get("x-team").unwrap(), "core");
        assert_eq!(sent.headers.get("x-trace").unwrap(), "abc");
        assert_eq!(sent.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_content_type_can_be_overridden() {
        let transport = ScriptedTransport::ok(vec![json!({})]);
        let exec = executor(&config(0).with_header("Content-Type", "application/vnd.mastra+json"), &transport);

        let _: Value = exec.execute("/api/health", RequestOptions::get()).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.headers.get(CONTENT_TYPE).unwrap(), "application/vnd.mastra+json");
    }

    #[tokio::test]
    async fn test_invalid_call_header_fails_before_sending() {
        let transport = ScriptedTransport::ok(vec![json!({})]);
        let exec = executor(&config(3), &transport);

        let result: Result<Value> = exec
            .execute("/api/health", RequestOptions::get().with_header("bad header", "x"))
            .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(transport.attempts(), 0);
    }

    #[test]
    fn test_invalid_config_header_rejected() {
        let transport = ScriptedTransport::default();
        let result = RequestExecutor::with_transport(&config(0).with_header("x-bad", "line\nbreak"), transport);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_url_and_body() {
        let transport = ScriptedTransport::ok(vec![json!({"text": "hi"})]);
        let exec = executor(&ClientConfig::new("http://agents.test/").with_retries(0), &transport);

        let _: Value = exec
            .execute("/api/agents/a1/generate", RequestOptions::post(json!({"messages": []})))
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.url, "http://agents.test/api/agents/a1/generate");
        assert_eq!(sent.body.as_deref(), Some("{\"messages\":[]}"));
    }
}
