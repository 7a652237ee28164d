//! Default `Content-Type` for API responses.

use crate::body::Body;
use http::{HeaderValue, Request, Response, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Default path prefix identifying the programmatic API surface.
pub const DEFAULT_API_PREFIX: &str = "/api";

const TEXT_PLAIN: &str = "text/plain";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// Request extension marking a request as targeting the API surface.
///
/// Routers insert this when API routes are not recognisable by path alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiRequest;

/// A Tower layer that fills in a missing `Content-Type` on API responses.
///
/// Textual bodies get `text/plain`, anything else is assumed to be JSON.
#[derive(Debug, Clone)]
pub struct ContentTypeLayer {
    api_prefix: Arc<str>,
}

impl ContentTypeLayer {
    /// Creates a layer recognising API requests under [`DEFAULT_API_PREFIX`].
    pub fn new() -> Self {
        Self {
            api_prefix: Arc::from(DEFAULT_API_PREFIX),
        }
    }

    /// Sets the path prefix that identifies API requests.
    pub fn api_prefix(mut self, prefix: impl Into<Arc<str>>) -> Self {
        self.api_prefix = prefix.into();
        self
    }
}

impl Default for ContentTypeLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for ContentTypeLayer {
    type Service = ContentTypeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContentTypeService {
            inner,
            api_prefix: self.api_prefix.clone(),
        }
    }
}

/// Service produced by [`ContentTypeLayer`].
#[derive(Debug, Clone)]
pub struct ContentTypeService<S> {
    inner: S,
    api_prefix: Arc<str>,
}

impl<S> ContentTypeService<S> {
    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for ContentTypeService<S>
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
        let api_call = req.extensions().get::<ApiRequest>().is_some()
            || req.uri().path().starts_with(&*self.api_prefix);

        ResponseFuture {
            inner: self.inner.call(req),
            api_call,
        }
    }
}

pin_project! {
    /// Response future for [`ContentTypeService`].
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        api_call: bool,
    }
}

impl<F, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<Body>, E>>,
{
    type Output = Result<Response<Body>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut response = std::task::ready!(this.inner.poll(cx))?;
        if *this.api_call {
            add_content_type(&mut response);
        }
        Poll::Ready(Ok(response))
    }
}

fn add_content_type(response: &mut Response<Body>) {
    if response.headers().contains_key(header::CONTENT_TYPE) {
        return;
    }

    let content_type = if response.body().is_text() {
        TEXT_PLAIN
    } else {
        APPLICATION_JSON
    };
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
}
