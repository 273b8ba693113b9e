use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{FetchError, Transport, TransportResponse, API_KEY_HEADER};

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("patient-risk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build patient API HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<TransportResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        let transport_error = |err: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source: Box::new(err),
        };

        let response = self
            .http
            .get(parsed)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn rejects_malformed_url_before_any_request() {
        let transport = ReqwestTransport::new("test-key").unwrap();
        let err = transport
            .get("not a url", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn sends_api_key_and_returns_non_success_status_as_value() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/patients")
                .query_param("limit", "5")
                .header(API_KEY_HEADER, "test-key");
            then.status(500).body(r#"{"error":"Internal server error"}"#);
        });

        let transport = ReqwestTransport::new("test-key").unwrap();
        let response = transport
            .get(
                &server.url("/api/patients?limit=5"),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(response.status, 500);
        assert!(response.body.contains("Internal server error"));
        mock.assert();
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn times_out_as_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/patients");
            then.status(200)
                .delay(Duration::from_millis(500))
                .body("{}");
        });

        let transport = ReqwestTransport::new("test-key").unwrap();
        let err = transport
            .get(&server.url("/api/patients"), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
