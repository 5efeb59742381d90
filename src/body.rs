use crate::encoder::GzipEncoder;
use crate::pool::EncoderPool;
use bytes::{Buf, Bytes};
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

pin_project! {
    /// A response body that may be gzip-compressed.
    ///
    /// This type wraps an inner body and either routes its data frames
    /// through a pooled [`GzipEncoder`] or passes them through unchanged.
    /// The inner body never learns which path it is on.
    #[project = CompressionBodyProj]
    #[allow(missing_docs)]
    pub enum CompressionBody<B> {
        /// Body compressed through a checked-out encoder.
        Compressed {
            #[pin]
            inner: B,
            state: CompressedBody,
        },
        /// Body forwarded without compression.
        Passthrough {
            #[pin]
            inner: B,
        },
    }
}

/// Encoder checkout and stream state for an actively compressed body.
///
/// The encoder is returned to the pool exactly once: eagerly when the stream
/// terminates, or from `Drop` when the body is abandoned mid-stream (for
/// example because the host aborted the request). The `Drop` path is what
/// makes the release guarantee hold on every exit path.
pub(crate) struct CompressedBody {
    encoder: Option<GzipEncoder>,
    pool: Arc<EncoderPool>,
    state: CompressState,
    pending_trailers: Option<http::HeaderMap>,
}

/// Stream state for a compressed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompressState {
    /// Pulling data from the inner body and compressing it.
    Streaming,
    /// Final compressed frame emitted; buffered trailers still to go out.
    Trailers,
    /// Stream terminated, encoder checked back in.
    Done,
}

impl CompressedBody {
    fn new(encoder: GzipEncoder, pool: Arc<EncoderPool>) -> Self {
        Self {
            encoder: Some(encoder),
            pool,
            state: CompressState::Streaming,
            pending_trailers: None,
        }
    }

    pub(crate) fn state(&self) -> CompressState {
        self.state
    }

    /// Polls the inner body, compressing data frames as they arrive.
    fn poll_compressed<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.state {
                CompressState::Done => return Poll::Ready(None),

                CompressState::Trailers => {
                    self.state = CompressState::Done;
                    match self.pending_trailers.take() {
                        Some(trailers) => {
                            return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                        }
                        None => return Poll::Ready(None),
                    }
                }

                CompressState::Streaming => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        return Poll::Ready(Some(self.finish_stream().map(Frame::data)));
                    }
                    Poll::Ready(Some(Err(e))) => {
                        self.terminate();
                        return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(data) => match self.encode_chunk(&copy_to_bytes(data)) {
                            // The deflater may buffer a whole chunk without
                            // emitting anything; poll for more input.
                            Ok(out) if out.is_empty() => continue,
                            Ok(out) => return Poll::Ready(Some(Ok(Frame::data(out)))),
                            Err(e) => return Poll::Ready(Some(Err(e))),
                        },
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                // Terminate the gzip member before the
                                // trailers go out.
                                self.pending_trailers = Some(trailers);
                                self.state = CompressState::Trailers;
                                return Poll::Ready(Some(self.finish_stream().map(Frame::data)));
                            }
                        }
                    },
                },
            }
        }
    }

    /// Compresses one chunk of input. Returns the bytes produced so far,
    /// which may be empty while the deflater is buffering.
    fn encode_chunk(&mut self, input: &[u8]) -> io::Result<Bytes> {
        let mut out = Vec::new();
        if let Some(encoder) = self.encoder.as_mut() {
            if let Err(e) = encoder.encode(input, &mut out) {
                self.terminate();
                return Err(e);
            }
        }
        Ok(Bytes::from(out))
    }

    /// Flushes the trailing gzip frame and checks the encoder back in.
    ///
    /// The encoder is released even when the flush fails; it is reset on its
    /// next checkout, so a failed stream cannot corrupt the pool.
    fn finish_stream(&mut self) -> io::Result<Bytes> {
        let mut out = Vec::new();
        let result = match self.encoder.as_mut() {
            Some(encoder) => encoder.finish(&mut out),
            None => Ok(()),
        };
        self.check_in();
        if self.state == CompressState::Streaming {
            self.state = CompressState::Done;
        }
        match result {
            Ok(()) => Ok(Bytes::from(out)),
            Err(e) => {
                self.state = CompressState::Done;
                Err(e)
            }
        }
    }

    /// Abandons the stream without a trailing frame, releasing the encoder.
    fn terminate(&mut self) {
        self.check_in();
        self.state = CompressState::Done;
    }

    fn check_in(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.pool.release(encoder);
        }
    }
}

impl Drop for CompressedBody {
    fn drop(&mut self) {
        // Covers abandonment mid-stream: the host dropping the response
        // before the body completes must not leak the checkout.
        self.check_in();
    }
}

impl<B> CompressionBody<B> {
    /// Creates a compressed body around a checked-out encoder.
    ///
    /// The encoder is returned to `pool` when the stream terminates or the
    /// body is dropped, whichever comes first.
    pub fn compressed(inner: B, encoder: GzipEncoder, pool: Arc<EncoderPool>) -> Self {
        Self::Compressed {
            inner,
            state: CompressedBody::new(encoder, pool),
        }
    }

    /// Creates a passthrough body that forwards frames unchanged.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }
}

impl<B> Body for CompressionBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            CompressionBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => {
                    Poll::Ready(Some(Ok(frame.map_data(copy_to_bytes))))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
            },
            CompressionBodyProj::Compressed { inner, state } => state.poll_compressed(cx, inner),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CompressionBody::Passthrough { inner } => inner.is_end_stream(),
            CompressionBody::Compressed { state, .. } => state.state() == CompressState::Done,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            CompressionBody::Passthrough { inner } => inner.size_hint(),
            // Compressed size is unknown up front.
            CompressionBody::Compressed { .. } => http_body::SizeHint::default(),
        }
    }
}

fn copy_to_bytes<D: Buf>(mut data: D) -> Bytes {
    let len = data.remaining();
    data.copy_to_bytes(len)
}
