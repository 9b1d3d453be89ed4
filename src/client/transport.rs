//! Network transport backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;

use crate::client::{HttpClient, HttpRequest, HttpResponse};
use crate::error::{GuardError, GuardResult};

/// Innermost client: performs the actual network round trip.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with a per-request deadline.
    pub fn new(timeout: Duration) -> GuardResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuardError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn network_error(e: reqwest::Error) -> GuardError {
    if e.is_timeout() {
        GuardError::TransientBackend("request timed out".to_string())
    } else if e.is_connect() {
        GuardError::TransientBackend(format!("connection failed: {}", e))
    } else {
        GuardError::TransientBackend(e.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> GuardResult<HttpResponse> {
        let (parts, body) = request.into_parts();

        let response = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(network_error)?;

        let mut out = HttpResponse::new(bytes.to_vec());
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
