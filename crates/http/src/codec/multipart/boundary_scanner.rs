//! Streaming search for the delimiter that ends a multipart body.
//!
//! The scanner copies body bytes from a [`RingReader`] to a sink until it meets
//! `\r\n--<boundary>`, holding back only the bytes that might still turn out to be the
//! start of that delimiter. A part is never buffered as a whole, so an upload of any
//! size passes through a window of the reader's capacity.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::RingReader;
use crate::ensure;
use crate::protocol::ParseError;

/// Copies part bodies up to their closing delimiter.
pub struct BoundaryScanner {
    delimiter: Vec<u8>,
    window: Box<[u8]>,
}

impl BoundaryScanner {
    /// Creates a scanner for `boundary` whose working window holds `capacity` bytes.
    ///
    /// The window must be larger than the delimiter, otherwise no progress is possible.
    pub fn new(boundary: &str, capacity: usize) -> Result<Self, ParseError> {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        ensure!(delimiter.len() < capacity, ParseError::missing_boundary(format!("boundary of {} bytes is too long", boundary.len())));

        Ok(Self { delimiter, window: vec![0; capacity].into_boxed_slice() })
    }

    /// The byte sequence that terminates a body: `\r\n--<boundary>`.
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Writes the body preceding the next delimiter to `sink` and returns its length.
    ///
    /// On success the reader is positioned right after the delimiter, so the caller sees
    /// the rest of the delimiter line (`\r\n` or the closing `--`). Sink failures are
    /// reported as [`ParseError::Io`]; running out of input is
    /// [`ParseError::BoundaryNotFound`].
    pub async fn scan<R, W>(&mut self, reader: &mut RingReader<R>, sink: &mut W) -> Result<u64, ParseError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let delimiter_len = self.delimiter.len();
        let mut carried = 0;
        let mut written = 0u64;

        loop {
            let received = reader.read_bulk(&mut self.window[carried..]).await;
            ensure!(received > 0, ParseError::BoundaryNotFound);

            let filled = carried + received;
            match find_delimiter(&self.window[..filled], &self.delimiter) {
                Some(end) => {
                    // a match can't fit in the carried bytes, so everything after it came
                    // from this read and is still resident in the ring
                    reader.rewind(filled - end);

                    let body = end - delimiter_len;
                    sink.write_all(&self.window[..body]).await?;
                    written += body as u64;

                    trace!(size = written, "found multipart delimiter");
                    return Ok(written);
                }
                None => {
                    let keep = (delimiter_len - 1).min(filled);
                    let flush = filled - keep;
                    if flush > 0 {
                        sink.write_all(&self.window[..flush]).await?;
                        written += flush as u64;
                    }

                    self.window.copy_within(flush..filled, 0);
                    carried = keep;
                }
            }
        }
    }
}

/// Returns the index just past the first occurrence of `delimiter` in `window`.
///
/// Tracks the length of the delimiter prefix matched so far; on a mismatch the match
/// restarts at 1 when the byte is the delimiter's leading `\r`, else at 0. This is exact
/// because a boundary never contains `\r`.
pub(crate) fn find_delimiter(window: &[u8], delimiter: &[u8]) -> Option<usize> {
    let mut matched = 0;

    for (i, &byte) in window.iter().enumerate() {
        if byte == delimiter[matched] {
            matched += 1;
            if matched == delimiter.len() {
                return Some(i + 1);
            }
        } else {
            matched = usize::from(byte == delimiter[0]);
        }
    }

    None
}
