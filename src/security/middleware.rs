//! Outbound security middleware.
//!
//! Two decorators over [`HttpClient`], composed once when the client is
//! built:
//! - [`RateLimitLayer`] rejects calls locally once the window is full and
//!   raises a user-visible notice
//! - [`CsrfLayer`] attaches the persisted anti-forgery token to every call

use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderName, HeaderValue};
use tower::{Layer, ServiceBuilder};

use crate::client::{HttpClient, HttpRequest, HttpResponse, RequestIdLayer};
use crate::error::{GuardError, GuardResult};
use crate::notice::{Notice, Notifier};
use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;
use crate::security::token::TokenStore;

/// Attaches the anti-forgery token header.
#[derive(Clone)]
pub struct CsrfLayer {
    tokens: Arc<TokenStore>,
    header: HeaderName,
}

impl CsrfLayer {
    pub fn new(tokens: Arc<TokenStore>, header: &str) -> GuardResult<Self> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| GuardError::Config(format!("invalid CSRF header '{}': {}", header, e)))?;
        Ok(Self { tokens, header })
    }
}

impl<C> Layer<C> for CsrfLayer {
    type Service = Csrf<C>;

    fn layer(&self, inner: C) -> Self::Service {
        Csrf {
            inner,
            tokens: self.tokens.clone(),
            header: self.header.clone(),
        }
    }
}

/// Client wrapper produced by [`CsrfLayer`].
pub struct Csrf<C> {
    inner: C,
    tokens: Arc<TokenStore>,
    header: HeaderName,
}

#[async_trait]
impl<C: HttpClient> HttpClient for Csrf<C> {
    async fn send(&self, mut request: HttpRequest) -> GuardResult<HttpResponse> {
        let token = self.tokens.token()?;
        let value = HeaderValue::from_str(token.as_str())
            .map_err(|e| GuardError::Config(format!("unusable CSRF token: {}", e)))?;
        request.headers_mut().insert(self.header.clone(), value);
        self.inner.send(request).await
    }
}

/// Rejects calls beyond the configured window budget.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
    notifier: Arc<dyn Notifier>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<RateLimiter>, notifier: Arc<dyn Notifier>) -> Self {
        Self { limiter, notifier }
    }
}

impl<C> Layer<C> for RateLimitLayer {
    type Service = RateLimited<C>;

    fn layer(&self, inner: C) -> Self::Service {
        RateLimited {
            inner,
            limiter: self.limiter.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

/// Client wrapper produced by [`RateLimitLayer`].
pub struct RateLimited<C> {
    inner: C,
    limiter: Arc<RateLimiter>,
    notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl<C: HttpClient> HttpClient for RateLimited<C> {
    async fn send(&self, request: HttpRequest) -> GuardResult<HttpResponse> {
        if !self.limiter.check() {
            let err = GuardError::RateLimitExceeded {
                limit: self.limiter.limit(),
                period_ms: self.limiter.period().as_millis() as u64,
            };
            tracing::warn!(uri = %request.uri(), limit = self.limiter.limit(), "Rate limit exceeded");
            metrics::record_rate_limited();
            self.notifier.notify(Notice::error(err.to_string()));
            return Err(err);
        }
        self.inner.send(request).await
    }
}

/// Wrap a transport with the full outbound chain.
///
/// Order, outermost first: rate limit, CSRF header, request id, transport.
/// A rejected call therefore never mints a token or reaches the network.
pub fn secure_client<C>(
    transport: C,
    limiter: Arc<RateLimiter>,
    tokens: Arc<TokenStore>,
    csrf_header: &str,
    notifier: Arc<dyn Notifier>,
) -> GuardResult<Arc<dyn HttpClient>>
where
    C: HttpClient + 'static,
{
    let client = ServiceBuilder::new()
        .layer(RateLimitLayer::new(limiter, notifier))
        .layer(CsrfLayer::new(tokens, csrf_header)?)
        .layer(RequestIdLayer)
        .service(transport);
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}
