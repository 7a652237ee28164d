//! One-time bootstrap of the public site URL.
//!
//! The first request that reaches an initialized store with no site URL seeds
//! it from `Origin`, falling back to `Host`. The check and the write are not
//! atomic: two concurrent first requests may both write, and the store's last
//! writer wins.

use crate::BoxError;
use crate::error::StageError;
use crate::settings::SettingsStore;
use http::{HeaderMap, Request, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use url::Url;

/// A Tower layer that seeds the site URL setting from incoming requests.
#[derive(Clone)]
pub struct SiteUrlLayer {
    store: Arc<dyn SettingsStore>,
}

impl SiteUrlLayer {
    /// Creates a layer writing to the given settings store.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for SiteUrlLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteUrlLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for SiteUrlLayer {
    type Service = SiteUrlService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SiteUrlService {
            inner,
            store: self.store.clone(),
        }
    }
}

/// Service produced by [`SiteUrlLayer`].
#[derive(Clone)]
pub struct SiteUrlService<S> {
    inner: S,
    store: Arc<dyn SettingsStore>,
}

impl<S> SiteUrlService<S> {
    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn bootstrap(&self, headers: &HeaderMap) -> Result<(), StageError> {
        if !self.store.is_initialized() || self.store.has_site_url() {
            return Ok(());
        }
        let Some(url) = candidate_site_url(headers) else {
            return Ok(());
        };

        if let Err(source) = self.store.set_site_url(&url) {
            return Err(StageError::PersistSiteUrl { url, source });
        }
        tracing::info!(site_url = %url, "set site url from first request");
        Ok(())
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for SiteUrlService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteUrlService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for SiteUrlService<S>
where
    S: Service<Request<ReqBody>>,
    S::Error: Into<BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if let Err(err) = self.bootstrap(req.headers()) {
            return ResponseFuture::Failed {
                error: Some(err.into()),
            };
        }
        ResponseFuture::Inner {
            future: self.inner.call(req),
        }
    }
}

pin_project! {
    /// Response future for [`SiteUrlService`].
    #[project = ResponseFutureProj]
    #[allow(missing_docs)]
    pub enum ResponseFuture<F> {
        /// Waiting on the inner service.
        Inner {
            #[pin]
            future: F,
        },
        /// The bootstrap failed before the inner service was called.
        Failed {
            error: Option<BoxError>,
        },
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Inner { future } => future.poll(cx).map_err(Into::into),
            ResponseFutureProj::Failed { error } => Poll::Ready(Err(error
                .take()
                .unwrap_or_else(|| "site url future polled after completion".into()))),
        }
    }
}

/// Derives a site URL from `Origin`, falling back to `http://` plus `Host`.
fn candidate_site_url(headers: &HeaderMap) -> Option<String> {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    value(header::ORIGIN).and_then(normalize_site_url).or_else(|| {
        value(header::HOST).and_then(|host| normalize_site_url(&format!("http://{host}")))
    })
}

/// Strips trailing slashes and accepts only absolute http(s) URLs with a host.
fn normalize_site_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(trimmed.to_owned())
}
