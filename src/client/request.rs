//! Request identification.
//!
//! Every outbound call gets a fresh `X-Request-Id` (UUID v4) so client logs
//! can be correlated with the hosted backend's logs.

use async_trait::async_trait;
use http::HeaderValue;
use tower::Layer;
use uuid::Uuid;

use crate::client::{HttpClient, HttpRequest, HttpResponse};
use crate::error::GuardResult;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layer that tags requests with a request id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<C> Layer<C> for RequestIdLayer {
    type Service = RequestId<C>;

    fn layer(&self, inner: C) -> Self::Service {
        RequestId { inner }
    }
}

/// Client wrapper produced by [`RequestIdLayer`].
#[derive(Debug, Clone)]
pub struct RequestId<C> {
    inner: C,
}

#[async_trait]
impl<C: HttpClient> HttpClient for RequestId<C> {
    async fn send(&self, mut request: HttpRequest) -> GuardResult<HttpResponse> {
        let id = Uuid::new_v4();
        if !request.headers().contains_key(REQUEST_ID_HEADER) {
            if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                request.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
        }

        tracing::debug!(
            request_id = %id,
            method = %request.method(),
            uri = %request.uri(),
            "Dispatching backend call"
        );

        self.inner.send(request).await
    }
}
