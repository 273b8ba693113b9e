mod http;
mod settings;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

pub use http::ReqwestTransport;
pub use settings::ApiSettings;

/// Header carrying the opaque API token on every request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Raw outcome of a single GET: the status is informational, never an error by itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failures surfaced by the fetch layer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("unusable response from {url} (status {status}): {reason}")]
    Protocol {
        url: String,
        status: u16,
        reason: String,
    },
}

impl FetchError {
    /// Input errors fail fast; everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUrl { .. })
    }

    fn protocol(url: &str, status: u16, reason: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.to_string(),
            status,
            reason: reason.into(),
        }
    }
}

/// Single timed HTTP GET with the API key attached.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request and buffer the whole body.
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, FetchError>;
}

/// Fixed-delay retry budget: `retries + 1` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Budget for the first page of a traversal.
    pub const fn first_page() -> Self {
        Self::new(3, Duration::from_millis(5000))
    }

    /// Budget for every page after the first.
    pub const fn next_page() -> Self {
        Self::new(3, Duration::from_millis(2000))
    }

    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Wraps a [`Transport`] with bounded retries and JSON decoding.
#[derive(Debug, Clone)]
pub struct RetryingFetcher<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> RetryingFetcher<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `url` until it yields a usable JSON payload of type `P` or the policy runs out.
    ///
    /// Empty bodies, unparseable JSON, falsy payloads, `{"error": ...}` bodies and payloads
    /// that do not decode into `P` all count as failed attempts, whatever the HTTP status.
    pub async fn fetch_json<P: DeserializeOwned>(
        &self,
        url: &str,
        policy: RetryPolicy,
    ) -> Result<P, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(url).await {
                Ok(payload) => return Ok(payload),
                Err(err) if !err.is_retryable() || attempt >= policy.retries => {
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        url,
                        attempt = attempt + 1,
                        attempts = policy.attempts(),
                        error = %err,
                        "fetch attempt failed; retrying"
                    );
                    sleep(policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt<P: DeserializeOwned>(&self, url: &str) -> Result<P, FetchError> {
        debug!(url, "GET");
        let response = self.transport.get(url, self.timeout).await?;
        let status = response.status;
        if response.body.is_empty() {
            return Err(FetchError::protocol(url, status, "empty response body"));
        }
        let payload: Value = serde_json::from_str(&response.body).map_err(|err| {
            FetchError::protocol(url, status, format!("body is not valid JSON: {err}"))
        })?;
        if is_falsy(&payload) {
            return Err(FetchError::protocol(url, status, "empty payload"));
        }
        if let Some(error) = payload.get("error").filter(|error| !is_falsy(error)) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(FetchError::protocol(
                url,
                status,
                format!("API error: {message}"),
            ));
        }
        serde_json::from_value(payload).map_err(|err| {
            FetchError::protocol(url, status, format!("invalid API response: {err}"))
        })
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64().map_or(false, |n| n == 0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use serde_json::json;

    const URL: &str = "https://api.test/api/patients?limit=5";

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::ZERO)
    }

    fn fetcher(transport: ScriptedTransport) -> RetryingFetcher<ScriptedTransport> {
        RetryingFetcher::new(transport, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn returns_first_usable_payload_without_further_attempts() {
        let transport = ScriptedTransport::new()
            .respond(URL, 200, r#"{"ok": true}"#)
            .respond(URL, 200, r#"{"ok": false}"#);
        let fetcher = fetcher(transport);
        let payload: Value = fetcher.fetch_json(URL, quick(3)).await.unwrap();
        assert_eq!(payload, json!({"ok": true}));
        assert_eq!(fetcher.transport().calls_to(URL), 1);
    }

    #[tokio::test]
    async fn retries_through_transport_and_protocol_failures() {
        let transport = ScriptedTransport::new()
            .fail(URL)
            .respond(URL, 200, "")
            .respond(URL, 200, "<html>busy</html>")
            .respond(URL, 200, r#"{"data": []}"#);
        let fetcher = fetcher(transport);
        let payload: Value = fetcher.fetch_json(URL, quick(3)).await.unwrap();
        assert_eq!(payload, json!({"data": []}));
        assert_eq!(fetcher.transport().calls_to(URL), 4);
    }

    #[tokio::test]
    async fn error_shaped_success_is_retried_then_surfaced() {
        let transport =
            ScriptedTransport::new().respond(URL, 200, r#"{"error": "Rate limit exceeded"}"#);
        let fetcher = fetcher(transport);
        let err = fetcher.fetch_json::<Value>(URL, quick(3)).await.unwrap_err();
        assert!(matches!(err, FetchError::Protocol { status: 200, .. }));
        assert!(err.to_string().contains("Rate limit exceeded"));
        assert_eq!(fetcher.transport().calls_to(URL), 4);
    }

    #[tokio::test]
    async fn falsy_payloads_count_as_failures() {
        for body in ["null", "false", "0", "\"\""] {
            let transport = ScriptedTransport::new().respond(URL, 200, body);
            let fetcher = fetcher(transport);
            let err = fetcher.fetch_json::<Value>(URL, quick(0)).await.unwrap_err();
            assert!(err.to_string().contains("empty payload"), "body {body}");
        }
    }

    #[tokio::test]
    async fn falsy_error_field_is_not_an_error() {
        let transport = ScriptedTransport::new().respond(URL, 200, r#"{"error": null, "n": 1}"#);
        let fetcher = fetcher(transport);
        let payload: Value = fetcher.fetch_json(URL, quick(0)).await.unwrap();
        assert_eq!(payload["n"], json!(1));
    }

    #[tokio::test]
    async fn non_success_status_with_usable_body_is_accepted() {
        let transport = ScriptedTransport::new().respond(URL, 503, r#"{"n": 2}"#);
        let fetcher = fetcher(transport);
        let payload: Value = fetcher.fetch_json(URL, quick(0)).await.unwrap();
        assert_eq!(payload["n"], json!(2));
    }

    #[tokio::test]
    async fn exhaustion_surfaces_last_transport_error() {
        let transport = ScriptedTransport::new().fail(URL);
        let fetcher = fetcher(transport);
        let err = fetcher.fetch_json::<Value>(URL, quick(2)).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(fetcher.transport().calls_to(URL), 3);
    }

    #[test]
    fn default_policies_match_page_budgets() {
        assert_eq!(RetryPolicy::first_page().attempts(), 4);
        assert_eq!(RetryPolicy::first_page().delay, Duration::from_secs(5));
        assert_eq!(RetryPolicy::next_page().delay, Duration::from_secs(2));
    }

    #[test]
    fn invalid_url_is_not_retryable() {
        let err = FetchError::InvalidUrl {
            url: "nope".into(),
            reason: "relative URL without a base".into(),
        };
        assert!(!err.is_retryable());
    }
}
