use super::codec::{OUTPUT_BUFFER_SIZE, encoder};
use bytes::{Bytes, BytesMut};
use compression_codecs::EncodeV2;
use compression_core::util::{PartialBuffer, WriteBuffer};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// A streamed body compressed with gzip as it is read.
    ///
    /// Trailers from the inner body are held back until the gzip footer has
    /// been emitted.
    pub struct GzipBody<B> {
        #[pin]
        inner: B,
        state: CompressedBody,
    }
}

/// State and buffers for an actively compressed body.
struct CompressedBody {
    encoder: Box<dyn EncodeV2 + Send>,
    output_buffer: Vec<u8>,
    always_flush: bool,
    state: CompressState,
    pending_trailers: Option<http::HeaderMap>,
}

/// State machine for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompressState {
    /// Reading data from inner body and compressing.
    Reading,
    /// Finishing compression after inner body is done.
    Finishing,
    /// Emitting buffered trailers.
    Trailers,
    /// Compression is complete.
    Done,
}

impl<B> GzipBody<B> {
    /// Wraps `inner`, flushing the encoder after every chunk when
    /// `always_flush` is set.
    pub fn new(inner: B, always_flush: bool) -> Self {
        Self {
            inner,
            state: CompressedBody {
                encoder: encoder(),
                output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
                always_flush,
                state: CompressState::Reading,
                pending_trailers: None,
            },
        }
    }

    /// Returns whether the encoder is flushed after every chunk.
    pub fn always_flush(&self) -> bool {
        self.state.always_flush
    }
}

impl CompressedBody {
    fn after_finish(&self) -> CompressState {
        if self.pending_trailers.is_some() {
            CompressState::Trailers
        } else {
            CompressState::Done
        }
    }

    /// Polls the inner body and compresses data.
    fn poll_compressed<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.state {
                CompressState::Done => return Poll::Ready(None),

                CompressState::Trailers => {
                    self.state = CompressState::Done;
                    return Poll::Ready(self.pending_trailers.take().map(|t| Ok(Frame::trailers(t))));
                }

                CompressState::Finishing => {
                    let mut output =
                        WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
                    let done = match self.encoder.finish(&mut output) {
                        Ok(done) => done,
                        Err(e) => return Poll::Ready(Some(Err(io::Error::other(e)))),
                    };

                    let written = output.written_len();
                    if done {
                        self.state = self.after_finish();
                    }
                    if written > 0 {
                        let data = Bytes::copy_from_slice(&self.output_buffer[..written]);
                        return Poll::Ready(Some(Ok(Frame::data(data))));
                    }
                }

                CompressState::Reading => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        self.state = CompressState::Finishing;
                    }
                    Poll::Ready(Some(Err(e))) => {
                        return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(data) => match self.compress_chunk(&data) {
                            Ok(compressed) if compressed.is_empty() => {}
                            Ok(compressed) => return Poll::Ready(Some(Ok(Frame::data(compressed)))),
                            Err(e) => return Poll::Ready(Some(Err(e))),
                        },
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                // Buffer trailers and finish compression first
                                self.pending_trailers = Some(trailers);
                                self.state = CompressState::Finishing;
                            }
                        }
                    },
                },
            }
        }
    }

    /// Compresses a chunk of input data.
    ///
    /// An empty result means the encoder buffered everything and the caller
    /// should keep reading.
    fn compress_chunk(&mut self, input: &[u8]) -> io::Result<Bytes> {
        let mut input_buf = PartialBuffer::new(input);
        let mut all_output = BytesMut::new();

        // Keep encoding until all input is consumed
        while input_buf.written_len() < input.len() {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            let consumed = input_buf.written_len();
            self.encoder
                .encode(&mut input_buf, &mut output)
                .map_err(io::Error::other)?;

            let written = output.written_len();
            if written == 0 && input_buf.written_len() == consumed {
                return Err(io::Error::other("gzip encoder made no progress"));
            }
            all_output.extend_from_slice(&self.output_buffer[..written]);
        }

        if self.always_flush {
            loop {
                let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
                let done = self.encoder.flush(&mut output).map_err(io::Error::other)?;
                let written = output.written_len();
                all_output.extend_from_slice(&self.output_buffer[..written]);
                if done {
                    break;
                }
            }
        }

        Ok(all_output.freeze())
    }
}

impl<B> Body for GzipBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        this.state.poll_compressed(cx, this.inner)
    }

    fn is_end_stream(&self) -> bool {
        self.state.state == CompressState::Done
    }

    fn size_hint(&self) -> SizeHint {
        // Compressed size is unknown
        SizeHint::default()
    }
}
