use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::GzEncoder;
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tracing::trace;

// inspired by actix-http
pub(crate) struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) enum Encoder {
    Gzip(GzEncoder<Writer>),
}

impl Encoder {
    pub(crate) fn gzip() -> Self {
        Self::Gzip(GzEncoder::new(Writer::new(), Compression::default()))
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Gzip(encoder) => encoder.write_all(data).inspect_err(|e| trace!(cause = %e, "gzip write failed")),
        }
    }

    fn take(&mut self) -> Bytes {
        match self {
            Self::Gzip(encoder) => encoder.get_mut().take(),
        }
    }

    fn finish(self) -> io::Result<Bytes> {
        match self {
            Self::Gzip(encoder) => encoder.finish().map(|writer| writer.buf.freeze()),
        }
    }
}

/// Gzip-encodes a whole buffer at once.
pub fn gzip(data: &[u8]) -> io::Result<Bytes> {
    let mut encoder = Encoder::gzip();
    encoder.write(data)?;
    encoder.finish()
}

pin_project! {
    /// A body encoded frame by frame as it is polled.
    pub(crate) struct EncodedBody<B> {
        #[pin]
        inner: B,
        encoder: Option<Encoder>,
    }
}

impl<B> EncodedBody<B> {
    pub(crate) fn new(inner: B, encoder: Encoder) -> Self {
        Self { inner, encoder: Some(encoder) }
    }
}

impl<B> Body for EncodedBody<B>
where
    B: Body<Data = Bytes, Error = io::Error>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        loop {
            if this.encoder.is_none() {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => {
                    let Ok(data) = frame.into_data() else {
                        trace!("dropping trailers of an encoded body");
                        continue;
                    };

                    let Some(encoder) = this.encoder.as_mut() else {
                        return Poll::Ready(None);
                    };
                    if let Err(e) = encoder.write(&data) {
                        return Poll::Ready(Some(Err(e)));
                    }

                    let bytes = encoder.take();
                    if bytes.is_empty() {
                        continue;
                    }
                    return Poll::Ready(Some(Ok(Frame::data(bytes))));
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    // flush the trailer of the stream exactly once
                    let Some(encoder) = this.encoder.take() else {
                        return Poll::Ready(None);
                    };
                    return match encoder.finish() {
                        Ok(bytes) if bytes.is_empty() => Poll::Ready(None),
                        Ok(bytes) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                        Err(e) => Poll::Ready(Some(Err(e))),
                    };
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.encoder.is_none()
    }
}
