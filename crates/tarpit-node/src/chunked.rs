//! HTTP/1.1 chunked-transfer-encoding framing (spec.md section 6:
//! "chunked transfer-encoding"), as a thin `AsyncWrite` wrapper so
//! `tarpit_stall::HttpStaller`'s byte-paced writes stay unmodified --
//! each write the staller makes becomes exactly one wire chunk.
//!
//! The wrapper never writes a terminating `0\r\n\r\n` chunk: a staller
//! that reaches its deadline leaves the socket open rather than
//! signalling completion, and one that is evicted shuts the transport
//! down directly. Both are the intended behaviour, not an omission.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncWrite, ReadBuf};

pub struct ChunkedWriter<W> {
    inner: W,
    pending: Vec<u8>,
    pending_offset: usize,
}

impl<W: AsyncWrite + Unpin> ChunkedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pending: Vec::new(), pending_offset: 0 }
    }
}

fn frame_chunk(data: &[u8]) -> Vec<u8> {
    let mut framed = format!("{:x}\r\n", data.len()).into_bytes();
    framed.extend_from_slice(data);
    framed.extend_from_slice(b"\r\n");
    framed
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ChunkedWriter<W> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if this.pending_offset >= this.pending.len() {
            if buf.is_empty() {
                return Poll::Ready(Ok(0));
            }
            this.pending = frame_chunk(buf);
            this.pending_offset = 0;
        }

        while this.pending_offset < this.pending.len() {
            match Pin::new(&mut this.inner).poll_write(cx, &this.pending[this.pending_offset..]) {
                Poll::Ready(Ok(0)) => {
                    return Poll::Ready(Err(io::Error::new(io::ErrorKind::WriteZero, "chunked writer: inner wrote zero bytes")))
                }
                Poll::Ready(Ok(n)) => this.pending_offset += n,
                Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
                Poll::Pending => return Poll::Pending,
            }
        }

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

// Only used through the `AsyncWrite` impl above; no reads ever flow
// through a `ChunkedWriter`, but `tokio::io::BufReader` requires its
// inner type to stay `AsyncRead` when the caller also reads from it,
// so this forwards unconditionally rather than forcing callers to
// hold the raw stream open separately.
impl<W: tokio::io::AsyncRead + Unpin> tokio::io::AsyncRead for ChunkedWriter<W> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}
