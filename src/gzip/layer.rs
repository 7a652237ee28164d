use super::service::GzipService;
use tower::Layer;

/// Default length, in characters, a text body must exceed to be compressed.
pub const DEFAULT_MIN_TEXT_LEN: usize = 200;

/// A Tower layer that gzips response bodies.
///
/// Only `200 OK` responses without a `Content-Encoding` are considered, and
/// only when the request's `Accept-Encoding` allows gzip. Text bodies longer
/// than the minimum length are compressed in one go; streamed bodies are
/// compressed as they are read. Buffered bytes and empty bodies pass through.
#[derive(Debug, Clone)]
pub struct GzipLayer {
    min_text_len: usize,
}

impl GzipLayer {
    /// Creates a new gzip layer with default settings.
    ///
    /// The default minimum text length is 200 characters.
    pub fn new() -> Self {
        Self {
            min_text_len: DEFAULT_MIN_TEXT_LEN,
        }
    }

    /// Sets the length a text body must exceed to be compressed.
    pub fn min_text_len(mut self, len: usize) -> Self {
        self.min_text_len = len;
        self
    }
}

impl Default for GzipLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for GzipLayer {
    type Service = GzipService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GzipService::new(inner, self.min_text_len)
    }
}
