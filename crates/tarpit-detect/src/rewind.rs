//! A connection wrapper that can replay its most recent read, grounded
//! on `protocol/detect/conn.go`'s `rewindableConn`.
//!
//! The detector needs to peek at the first bytes a client sends,
//! decide which virtual listener owns them, then hand the connection
//! off as if nothing had been consumed. Rather than the original's
//! fixed-size byte array copied on every read, this keeps the bytes
//! from exactly one upstream read at a time -- the detector only ever
//! performs a single detection read before either dispatching or
//! re-arming for another round, so there is nothing to accumulate.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub struct RewindableConn<T> {
    inner: T,
    buffer: Vec<u8>,
    cursor: usize,
    replaying: bool,
    capacity: usize,
}

impl<T> RewindableConn<T> {
    pub fn new(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            cursor: 0,
            replaying: false,
            capacity,
        }
    }

    /// Arms the connection to replay its last captured read before any
    /// further bytes come from the socket.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.replaying = !self.buffer.is_empty();
    }

    /// Drops the captured bytes -- called when the buffer is fully
    /// drained, or explicitly when a caller knows it will never be
    /// replayed.
    pub fn erase(&mut self) {
        self.replaying = false;
        self.buffer.clear();
        self.cursor = 0;
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for RewindableConn<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.replaying {
            let available = &this.buffer[this.cursor..];
            let n = available.len().min(buf.remaining());
            buf.put_slice(&available[..n]);
            this.cursor += n;
            if this.cursor >= this.buffer.len() {
                this.erase();
            }
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let newly_read = &buf.filled()[before..];
            let take = newly_read.len().min(this.capacity);
            this.buffer = newly_read[..take].to_vec();
            this.cursor = 0;
        }
        poll
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for RewindableConn<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn rewind_replays_the_last_read_before_the_socket() {
        let (mut client, server) = duplex(1024);
        let mut conn = RewindableConn::new(server, 128);

        client.write_all(b"USER anonymous\r\n").await.unwrap();

        let mut buf = [0u8; 128];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"USER anonymous\r\n");

        conn.rewind();

        let mut replay = [0u8; 128];
        let replayed = conn.read(&mut replay).await.unwrap();
        assert_eq!(&replay[..replayed], b"USER anonymous\r\n");

        client.write_all(b"PASS x\r\n").await.unwrap();
        let mut next = [0u8; 128];
        let next_n = conn.read(&mut next).await.unwrap();
        assert_eq!(&next[..next_n], b"PASS x\r\n");
    }

    #[tokio::test]
    async fn erase_drops_the_buffer_even_if_unread() {
        let (mut client, server) = duplex(1024);
        let mut conn = RewindableConn::new(server, 128);

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 128];
        conn.read(&mut buf).await.unwrap();

        conn.erase();
        assert!(!conn.replaying);
    }

    #[tokio::test]
    async fn capture_is_capped_at_the_configured_capacity() {
        let (mut client, server) = duplex(1024);
        let mut conn = RewindableConn::new(server, 4);

        client.write_all(b"abcdefgh").await.unwrap();
        let mut buf = [0u8; 128];
        conn.read(&mut buf).await.unwrap();

        conn.rewind();
        let mut replay = [0u8; 128];
        let n = conn.read(&mut replay).await.unwrap();
        assert_eq!(&replay[..n], b"abcd");
    }
}
