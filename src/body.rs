use crate::BoxError;
use bytes::{Buf, Bytes};
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A response body as seen by the middleware stages.
///
/// The variant records the shape the handler produced, which drives both the
/// default `Content-Type` and the gzip eligibility decision.
#[derive(Default)]
pub enum Body {
    /// No body at all.
    #[default]
    Empty,
    /// A textual body.
    Text(String),
    /// A finite byte buffer.
    Bytes(Bytes),
    /// A lazily produced byte stream, such as file contents.
    Stream(UnsyncBoxBody<Bytes, BoxError>),
}

/// The shape of a [`Body`], without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// See [`Body::Empty`].
    Empty,
    /// See [`Body::Text`].
    Text,
    /// See [`Body::Bytes`].
    Bytes,
    /// See [`Body::Stream`].
    Stream,
}

impl Body {
    /// Creates an empty body.
    pub fn empty() -> Self {
        Body::Empty
    }

    /// Wraps any `http_body::Body` as a streamed body.
    ///
    /// Data chunks are converted to `Bytes` as they are produced.
    pub fn from_stream<B>(body: B) -> Self
    where
        B: http_body::Body + Send + 'static,
        B::Data: Buf,
        B::Error: Into<BoxError>,
    {
        let body = body
            .map_frame(|frame| frame.map_data(|mut data| data.copy_to_bytes(data.remaining())))
            .map_err(Into::into);
        Body::Stream(UnsyncBoxBody::new(body))
    }

    /// Returns the shape of this body.
    pub fn kind(&self) -> BodyKind {
        match self {
            Body::Empty => BodyKind::Empty,
            Body::Text(_) => BodyKind::Text,
            Body::Bytes(_) => BodyKind::Bytes,
            Body::Stream(_) => BodyKind::Stream,
        }
    }

    /// Returns `true` for [`Body::Text`].
    pub fn is_text(&self) -> bool {
        matches!(self, Body::Text(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        // Buffered variants yield once and leave an empty body behind.
        match std::mem::take(this) {
            Body::Empty => Poll::Ready(None),
            Body::Text(text) => Poll::Ready(non_empty_frame(Bytes::from(text))),
            Body::Bytes(bytes) => Poll::Ready(non_empty_frame(bytes)),
            Body::Stream(mut stream) => {
                let poll = http_body::Body::poll_frame(Pin::new(&mut stream), cx);
                *this = Body::Stream(stream);
                poll
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(text) => text.is_empty(),
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Stream(stream) => http_body::Body::is_end_stream(stream),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Body::Empty => SizeHint::with_exact(0),
            Body::Text(text) => SizeHint::with_exact(text.len() as u64),
            Body::Bytes(bytes) => SizeHint::with_exact(bytes.len() as u64),
            Body::Stream(stream) => http_body::Body::size_hint(stream),
        }
    }
}

fn non_empty_frame(data: Bytes) -> Option<Result<Frame<Bytes>, BoxError>> {
    (!data.is_empty()).then(|| Ok(Frame::data(data)))
}
