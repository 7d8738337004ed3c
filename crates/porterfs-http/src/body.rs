//! Response and request body plumbing.
//!
//! [`ResponseBody`] supports three modes: empty (204s, HEAD), buffered
//! (XML payloads), and streaming (object bytes straight off a file
//! handle). On the request side, [`byte_stream`] adapts any HTTP body into
//! the [`ByteStream`] the storage engine consumes, chunk by chunk.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use http_body_util::{BodyStream, Full};
use tokio_util::io::ReaderStream;

use porterfs_model::ByteStream;
use porterfs_store::ObjectReader;

/// Response body for the S3 surface.
#[derive(Debug, Default)]
pub enum ResponseBody {
    /// No body: 204 responses, HEAD responses.
    #[default]
    Empty,
    /// Buffered body for XML payloads and error documents.
    Buffered(Full<Bytes>),
    /// Object bytes streamed from a seeked, length-limited file handle.
    Streaming(ReaderStream<ObjectReader>),
}

impl ResponseBody {
    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// A buffered body from raw bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// A buffered body from an XML byte vector.
    #[must_use]
    pub fn from_xml(xml: Vec<u8>) -> Self {
        Self::Buffered(Full::new(Bytes::from(xml)))
    }

    /// A streaming body over an object reader.
    #[must_use]
    pub fn streaming(reader: ObjectReader) -> Self {
        Self::Streaming(ReaderStream::with_capacity(reader, 64 * 1024))
    }
}

impl http_body::Body for ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Empty => Poll::Ready(None),
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming(stream) => match Pin::new(stream).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    Poll::Ready(Some(Ok(http_body::Frame::data(chunk))))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming(_) => false,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Empty => http_body::SizeHint::with_exact(0),
            Self::Buffered(full) => full.size_hint(),
            // Length is announced via the Content-Length header instead.
            Self::Streaming(_) => http_body::SizeHint::default(),
        }
    }
}

/// Adapt an HTTP request body into the engine's [`ByteStream`].
///
/// Data frames pass through untouched; a transport error surfaces as an
/// `io::Error` chunk, which the engine treats as a client disconnect.
pub fn byte_stream<B>(body: B) -> ByteStream
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    let stream = BodyStream::new(body).filter_map(|frame| async move {
        match frame {
            Ok(frame) => frame.into_data().ok().map(Ok),
            Err(e) => Some(Err(io::Error::other(e.into()))),
        }
    });
    Box::pin(stream)
}

/// Drain a [`ByteStream`] into memory. Only for the small XML request
/// bodies; object payloads never come through here.
pub async fn collect(mut stream: ByteStream) -> io::Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
