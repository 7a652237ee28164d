use super::body::GzipBody;
use super::codec::{GZIP, gzip_bytes};
use crate::body::Body;
use http::{HeaderValue, Response, StatusCode, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Response future for [`GzipService`](super::GzipService).
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        accepts_gzip: bool,
        min_text_len: usize,
    }
}

impl<F> ResponseFuture<F> {
    pub(crate) fn new(inner: F, accepts_gzip: bool, min_text_len: usize) -> Self {
        Self {
            inner,
            accepts_gzip,
            min_text_len,
        }
    }
}

impl<F, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<Body>, E>>,
{
    type Output = Result<Response<Body>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(response)) => Poll::Ready(Ok(maybe_gzip(
                response,
                *this.accepts_gzip,
                *this.min_text_len,
            ))),
        }
    }
}

/// Gzips the response body if the response and the client both allow it.
fn maybe_gzip(
    response: Response<Body>,
    accepts_gzip: bool,
    min_text_len: usize,
) -> Response<Body> {
    if response.status() != StatusCode::OK
        || response.headers().contains_key(header::CONTENT_ENCODING)
        || !accepts_gzip
    {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let body = match body {
        Body::Text(text) if text.chars().count() > min_text_len => {
            match gzip_bytes(text.as_bytes()) {
                Ok(compressed) => {
                    parts
                        .headers
                        .insert(header::CONTENT_LENGTH, HeaderValue::from(compressed.len()));
                    Body::Bytes(compressed)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "gzip failed, sending response uncompressed");
                    return Response::from_parts(parts, Body::Text(text));
                }
            }
        }
        Body::Stream(stream) => {
            let always_flush = parts
                .headers
                .get("x-accel-buffering")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("no"))
                || is_event_stream(&parts.headers);

            // Remove Content-Length since compressed size is unknown
            parts.headers.remove(header::CONTENT_LENGTH);
            Body::from_stream(GzipBody::new(stream, always_flush))
        }
        body => {
            tracing::debug!(kind = ?body.kind(), "response body not compressible");
            return Response::from_parts(parts, body);
        }
    };

    parts
        .headers
        .insert(header::CONTENT_ENCODING, HeaderValue::from_static(GZIP));

    // Remove Accept-Ranges since we can't support ranges on compressed content
    parts.headers.remove(header::ACCEPT_RANGES);

    add_vary_accept_encoding(&mut parts.headers);

    Response::from_parts(parts, body)
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut header::HeaderMap) {
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        header::HeaderValue::from_static("accept-encoding"),
    );
}

fn is_event_stream(headers: &header::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"))
}
