//! Outbound HTTP client interface.
//!
//! # Data Flow
//! ```text
//! RestBackend call
//!     → security::middleware (rate limit, CSRF header)
//!     → request.rs (X-Request-Id)
//!     → transport.rs (reqwest, per-request timeout)
//! ```
//!
//! # Design Decisions
//! - One trait, many decorators: every layer is an `HttpClient` wrapping
//!   another, composed once with `tower::ServiceBuilder`
//! - Bodies are buffered `Vec<u8>`; payloads here are small JSON documents
//!   and single uploaded files
//! - The transport never interprets status codes; callers decide what a
//!   4xx/5xx means for their operation

pub mod request;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GuardResult;

pub use request::{RequestId, RequestIdLayer};
pub use transport::ReqwestTransport;

/// Outbound request with a buffered body.
pub type HttpRequest = http::Request<Vec<u8>>;

/// Inbound response with a buffered body.
pub type HttpResponse = http::Response<Vec<u8>>;

/// A single HTTP round trip.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> GuardResult<HttpResponse>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn send(&self, request: HttpRequest) -> GuardResult<HttpResponse> {
        (**self).send(request).await
    }
}
