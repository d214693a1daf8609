//! Buffered reader over the read half of a connection.
//!
//! [`RingReader`] keeps the bytes received from the peer in a fixed-capacity circular
//! buffer and serves them byte by byte, line by line or in bulk. Bytes that were handed
//! out can be pushed back with [`RingReader::rewind`] as long as no refill has
//! overwritten them, which is what the multipart boundary scanner relies on after it
//! over-reads past a delimiter.
//!
//! Read errors from the underlying stream are logged and reported as end-of-stream:
//! the callers turn a short stream into a [`ParseError`](crate::protocol::ParseError)
//! of their own.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Capacity used by [`RingReader::new`].
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// A fixed-capacity circular read buffer.
///
/// Invariant: `len <= capacity`; both cursors wrap modulo the capacity.
pub struct RingReader<R> {
    inner: R,
    buf: Box<[u8]>,
    /// Where the next received byte is stored.
    input: usize,
    /// Where the next byte is served from.
    output: usize,
    len: usize,
    total: u64,
}

impl<R: AsyncRead + Unpin> RingReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        assert!(capacity > 0, "ring reader capacity must be positive");
        Self {
            inner,
            buf: vec![0; capacity].into_boxed_slice(),
            input: 0,
            output: 0,
            len: 0,
            total: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes received but not yet served.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// Bytes received from the underlying stream over the reader's lifetime.
    #[inline]
    pub fn total_read(&self) -> u64 {
        self.total
    }

    /// Performs one read on the underlying stream straight into the free part of the ring.
    ///
    /// A read never crosses the end of the ring: when the free span wraps, this call
    /// fills up to the end and the next one continues at the start. Returns the number of
    /// bytes added. Zero means end-of-stream, a read error, or a full ring; there is no
    /// retry.
    pub async fn fill(&mut self) -> usize {
        let cap = self.capacity();
        let room = cap - self.len;
        if room == 0 {
            return 0;
        }

        let end = self.input + room.min(cap - self.input);
        let received = match self.inner.read(&mut self.buf[self.input..end]).await {
            Ok(n) => n,
            Err(e) => {
                debug!(cause = %e, "read from peer failed, treating as end of stream");
                0
            }
        };

        self.input = (self.input + received) % cap;
        self.len += received;
        self.total += received as u64;
        received
    }

    /// Returns the next byte, or `None` at end-of-stream.
    pub async fn read_byte(&mut self) -> Option<u8> {
        if self.len == 0 && self.fill().await == 0 {
            return None;
        }

        let byte = self.buf[self.output];
        self.consume(1);
        Some(byte)
    }

    /// Reads one line into `out`, replacing its previous content.
    ///
    /// The terminating `\n` is kept, every `\r` is dropped. Returns the length of `out`,
    /// which is zero only at end-of-stream.
    pub async fn read_line(&mut self, out: &mut Vec<u8>) -> usize {
        self.read_line_bounded(out, usize::MAX).await
    }

    /// Like [`read_line`](Self::read_line) but stops once `out` holds `limit` bytes.
    ///
    /// A result of `limit` bytes not ending in `\n` means the line was cut short.
    pub async fn read_line_bounded(&mut self, out: &mut Vec<u8>, limit: usize) -> usize {
        out.clear();
        let cap = self.capacity();

        while out.len() < limit {
            if self.len == 0 && self.fill().await == 0 {
                break;
            }

            let contiguous = self.len.min(cap - self.output);
            let budget = contiguous.min(limit - out.len());
            let chunk = &self.buf[self.output..self.output + budget];

            let (take, complete) = match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (budget, false),
            };

            out.extend(chunk[..take].iter().copied().filter(|&b| b != b'\r'));
            self.consume(take);

            if complete {
                break;
            }
        }

        out.len()
    }

    /// Copies up to `dst.len()` buffered bytes into `dst`.
    ///
    /// Refills once when fewer than `dst.len()` bytes are buffered. Returns the number of
    /// bytes copied, zero at end-of-stream.
    pub async fn read_bulk(&mut self, dst: &mut [u8]) -> usize {
        if self.len < dst.len() {
            self.fill().await;
        }

        let cap = self.capacity();
        let n = dst.len().min(self.len);
        let first = n.min(cap - self.output);
        dst[..first].copy_from_slice(&self.buf[self.output..self.output + first]);
        dst[first..n].copy_from_slice(&self.buf[..n - first]);

        self.consume(n);
        n
    }

    /// Moves the read cursor back by `n` bytes so they are served again.
    ///
    /// The caller must only rewind bytes it has been served since the last refill that
    /// could have reused their slots; `n` may never exceed the free space of the ring.
    pub fn rewind(&mut self, n: usize) {
        let cap = self.capacity();
        debug_assert!(n <= cap - self.len, "rewind of {n} bytes exceeds the {} free bytes of the ring", cap - self.len);

        self.output = (self.output + cap - n % cap) % cap;
        self.len += n;
    }

    #[inline]
    fn consume(&mut self, n: usize) {
        self.output = (self.output + n) % self.capacity();
        self.len -= n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_support::ChunkedReader;
    use indoc::indoc;

    #[tokio::test]
    async fn lines_strip_carriage_returns() {
        let raw = "GET /sdcard HTTP/1.0\r\nHost: phone\r\n\r\n";
        let mut reader = RingReader::new(ChunkedReader::new(raw, 3));
        let mut line = Vec::new();

        assert_eq!(reader.read_line(&mut line).await, 21);
        assert_eq!(line, b"GET /sdcard HTTP/1.0\n");

        reader.read_line(&mut line).await;
        assert_eq!(line, b"Host: phone\n");

        assert_eq!(reader.read_line(&mut line).await, 1);
        assert_eq!(line, b"\n");

        assert_eq!(reader.read_line(&mut line).await, 0);
        assert!(line.is_empty());
        assert_eq!(reader.total_read(), raw.len() as u64);
    }

    #[tokio::test]
    async fn last_line_without_newline() {
        let raw = indoc! {"
            first
            second"};
        let mut reader = RingReader::new(ChunkedReader::new(raw, 4));
        let mut line = Vec::new();

        reader.read_line(&mut line).await;
        assert_eq!(line, b"first\n");
        reader.read_line(&mut line).await;
        assert_eq!(line, b"second");
        assert_eq!(reader.read_line(&mut line).await, 0);
    }

    #[tokio::test]
    async fn bounded_line_is_cut() {
        let mut reader = RingReader::new(ChunkedReader::new("abcdefgh\n", 100));
        let mut line = Vec::new();

        assert_eq!(reader.read_line_bounded(&mut line, 4).await, 4);
        assert_eq!(line, b"abcd");
        reader.read_line(&mut line).await;
        assert_eq!(line, b"efgh\n");
    }

    #[tokio::test]
    async fn bulk_reads_across_wrap_around() {
        let mut reader = RingReader::with_capacity(ChunkedReader::new("abcdefghijklmnop", 8), 8);
        let mut dst = [0u8; 6];

        assert_eq!(reader.read_bulk(&mut dst).await, 6);
        assert_eq!(&dst, b"abcdef");

        // "gh" sit at the end of the ring, the refill puts "ijklmn" at its start
        assert_eq!(reader.read_bulk(&mut dst).await, 6);
        assert_eq!(&dst, b"ghijkl");

        assert_eq!(reader.read_bulk(&mut dst).await, 4);
        assert_eq!(&dst[..4], b"mnop");
        assert_eq!(reader.read_bulk(&mut dst).await, 0);
        assert_eq!(reader.total_read(), 16);
    }

    #[tokio::test]
    async fn fill_stops_at_the_end_of_the_ring() {
        let mut reader = RingReader::with_capacity(ChunkedReader::new("abcdefghijkl", 6), 8);
        let mut dst = [0u8; 4];

        assert_eq!(reader.fill().await, 6);
        assert_eq!(reader.read_bulk(&mut dst).await, 4);

        // the free span is 6..8 then 0..4: one fill per side
        assert_eq!(reader.fill().await, 2);
        assert_eq!(reader.fill().await, 4);
        assert_eq!(reader.buffered(), 8);
        assert_eq!(reader.fill().await, 0);

        let mut rest = [0u8; 8];
        assert_eq!(reader.read_bulk(&mut rest).await, 8);
        assert_eq!(&rest, b"efghijkl");
    }

    #[tokio::test]
    async fn rewind_then_reread() {
        let mut reader = RingReader::with_capacity(ChunkedReader::new("0123456789", 6), 8);
        let mut dst = [0u8; 6];

        assert_eq!(reader.read_bulk(&mut dst).await, 6);
        reader.rewind(4);
        assert_eq!(reader.buffered(), 4);

        let mut again = [0u8; 4];
        assert_eq!(reader.read_bulk(&mut again).await, 4);
        assert_eq!(&again, b"2345");

        assert_eq!(reader.read_byte().await, Some(b'6'));
        reader.rewind(1);
        assert_eq!(reader.read_byte().await, Some(b'6'));
    }

    #[tokio::test]
    async fn rewind_across_wrap_around() {
        let mut reader = RingReader::with_capacity(ChunkedReader::new("abcdefghijklmnop", 8), 8);
        let mut dst = [0u8; 6];
        reader.read_bulk(&mut dst).await;
        reader.read_bulk(&mut dst).await;
        assert_eq!(&dst, b"ghijkl");

        // "gh" sit at the end of the ring, "ijkl" at its start
        reader.rewind(6);
        assert_eq!(reader.buffered(), 8);
        let mut again = [0u8; 6];
        assert_eq!(reader.read_bulk(&mut again).await, 6);
        assert_eq!(&again, b"ghijkl");
    }

    #[tokio::test]
    async fn bytes_until_end_of_stream() {
        let mut reader = RingReader::new(ChunkedReader::new("--", 1));
        assert_eq!(reader.read_byte().await, Some(b'-'));
        assert_eq!(reader.read_byte().await, Some(b'-'));
        assert_eq!(reader.read_byte().await, None);
        assert_eq!(reader.read_byte().await, None);
    }
}
