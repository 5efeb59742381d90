use crate::encoding::accepts_gzip;
use crate::future::ResponseFuture;
use crate::pool::EncoderPool;
use http::Request;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::trace;

/// A Tower service that gzip-compresses HTTP response bodies.
///
/// The wrapped service is called with the request untouched and stays
/// unaware of whether its response body is later compressed; the decision is
/// made here, per request, from the `Accept-Encoding` header alone. Encoders
/// come from the passed-in [`EncoderPool`], so independently configured
/// instances never contend on shared state.
#[derive(Debug, Clone)]
pub struct CompressionService<S> {
    inner: S,
    pool: Arc<EncoderPool>,
}

impl<S> CompressionService<S> {
    /// Creates a new compression service wrapping the given inner service,
    /// drawing encoders from `pool`.
    pub fn new(inner: S, pool: Arc<EncoderPool>) -> Self {
        Self { inner, pool }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Returns the pool this service draws encoders from.
    pub fn pool(&self) -> &Arc<EncoderPool> {
        &self.pool
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CompressionService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
{
    type Response = http::Response<crate::body::CompressionBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let engaged = accepts_gzip(req.headers());
        trace!(engaged, "negotiated response encoding");

        let pool = engaged.then(|| Arc::clone(&self.pool));
        ResponseFuture::new(self.inner.call(req), pool)
    }
}
