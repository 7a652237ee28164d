use super::catalog::LocaleCatalog;
use super::tag::{Locale, parse_accept_language};
use crate::headers::joined;
use http::{Request, header};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::futures::TaskLocalFuture;
use tower::{Layer, Service};

tokio::task_local! {
    static CURRENT_LOCALE: Locale;
}

/// Returns the locale negotiated for the request being handled, if any.
///
/// Outside of a [`LocaleService`] call this is `None`.
pub fn current_locale() -> Option<Locale> {
    CURRENT_LOCALE.try_with(Locale::clone).ok()
}

/// A Tower layer that negotiates a locale per request.
#[derive(Clone)]
pub struct LocaleLayer {
    catalog: Arc<dyn LocaleCatalog>,
}

impl LocaleLayer {
    /// Creates a layer negotiating against the given catalog.
    pub fn new(catalog: Arc<dyn LocaleCatalog>) -> Self {
        Self { catalog }
    }
}

impl std::fmt::Debug for LocaleLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocaleLayer")
            .field("available", &self.catalog.available_locales())
            .finish()
    }
}

impl<S> Layer<S> for LocaleLayer {
    type Service = LocaleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LocaleService {
            inner,
            catalog: self.catalog.clone(),
        }
    }
}

/// Service produced by [`LocaleLayer`].
///
/// The negotiated locale is inserted into the request extensions and bound to
/// the task-local read by [`current_locale`], both while the inner service's
/// `call` runs and on every poll of the future it returns.
#[derive(Clone)]
pub struct LocaleService<S> {
    inner: S,
    catalog: Arc<dyn LocaleCatalog>,
}

impl<S> LocaleService<S> {
    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for LocaleService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocaleService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for LocaleService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TaskLocalFuture<Locale, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let ranges = joined(req.headers(), header::ACCEPT_LANGUAGE)
            .map(|value| parse_accept_language(&value))
            .unwrap_or_default();
        let locale = self.catalog.negotiate(&ranges);
        tracing::debug!(locale = %locale, "negotiated request locale");

        req.extensions_mut().insert(locale.clone());
        let inner = &mut self.inner;
        let future = CURRENT_LOCALE.sync_scope(locale.clone(), || inner.call(req));
        CURRENT_LOCALE.scope(locale, future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_locale_outside_request() {
        assert_eq!(current_locale(), None);
    }

    #[test]
    fn test_sync_scope_binds_locale() {
        let locale = Locale::parse("de").unwrap();
        let seen = CURRENT_LOCALE.sync_scope(locale.clone(), current_locale);
        assert_eq!(seen, Some(locale));
        assert_eq!(current_locale(), None);
    }
}
