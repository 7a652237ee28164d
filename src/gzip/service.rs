use super::codec::accepts_gzip;
use super::future::ResponseFuture;
use crate::body::Body;
use crate::headers::joined;
use http::{Request, Response};
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that gzips response bodies.
#[derive(Debug, Clone)]
pub struct GzipService<S> {
    inner: S,
    min_text_len: usize,
}

impl<S> GzipService<S> {
    /// Creates a new gzip service wrapping the given inner service.
    pub fn new(inner: S, min_text_len: usize) -> Self {
        Self {
            inner,
            min_text_len,
        }
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
}

impl<S, ReqBody> Service<Request<ReqBody>> for GzipService<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let accepts_gzip = joined(req.headers(), http::header::ACCEPT_ENCODING)
            .is_some_and(|value| accepts_gzip(&value));

        let inner = self.inner.call(req);

        ResponseFuture::new(inner, accepts_gzip, self.min_text_len)
    }
}
