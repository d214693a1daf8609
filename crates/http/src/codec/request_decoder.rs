//! Reading of the request head from a connection.
//!
//! The head is collected line by line from the connection's [`RingReader`] and decoded
//! with [`HeaderDecoder`] once the blank line arrives. Nothing past the blank line is
//! consumed, so a multipart body can be read from the same reader afterwards.

use bytes::BytesMut;
use tokio::io::AsyncRead;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::RingReader;
use crate::codec::header::{HeaderDecoder, MAX_HEADER_BYTES};
use crate::ensure;
use crate::protocol::{ParseError, RequestHeader};

/// Decodes the request line and header fields of a request.
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    head: BytesMut,
    line: Vec<u8>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads the next request head from `reader`.
    ///
    /// Returns `Ok(None)` when the peer closed the connection without sending anything.
    pub async fn read_head<R>(&mut self, reader: &mut RingReader<R>) -> Result<Option<RequestHeader>, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        self.head.clear();

        loop {
            let limit = MAX_HEADER_BYTES + 1 - self.head.len().min(MAX_HEADER_BYTES);
            let n = reader.read_line_bounded(&mut self.line, limit).await;
            if n == 0 {
                if self.head.is_empty() {
                    return Ok(None);
                }
                return Err(ParseError::unexpected_eof("request head"));
            }

            let complete = self.line.ends_with(b"\n");
            let content = if complete { &self.line[..n - 1] } else { &self.line[..] };

            if content.is_empty() && self.head.is_empty() {
                // tolerate empty lines ahead of the request line
                continue;
            }

            self.head.extend_from_slice(content);
            self.head.extend_from_slice(b"\r\n");
            ensure!(self.head.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(self.head.len(), MAX_HEADER_BYTES));
            ensure!(complete, ParseError::unexpected_eof("request head"));

            if content.is_empty() {
                trace!(head_size = self.head.len(), "received request head");
                return match self.header_decoder.decode(&mut self.head)? {
                    Some(header) => Ok(Some(header)),
                    None => Err(ParseError::invalid_header("incomplete request head")),
                };
            }
        }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, head: BytesMut::with_capacity(1024), line: Vec::with_capacity(256) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_support::ChunkedReader;
    use http::Method;
    use indoc::indoc;

    #[tokio::test]
    async fn head_leaves_body_in_reader() {
        let raw = indoc! {"
            POST /sdcard HTTP/1.0
            Content-Type: multipart/form-data; boundary=XYZ

            --XYZ--
        "};
        let mut reader = RingReader::new(ChunkedReader::new(raw, 5));
        let mut decoder = RequestDecoder::new();

        let header = decoder.read_head(&mut reader).await.unwrap().unwrap();
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(header.boundary().unwrap(), "XYZ");

        let mut line = Vec::new();
        reader.read_line(&mut line).await;
        assert_eq!(line, b"--XYZ--\n");
    }

    #[tokio::test]
    async fn leading_blank_lines_skipped() {
        let mut reader = RingReader::new(ChunkedReader::new("\r\n\r\nGET / HTTP/1.0\r\n\r\n", 3));
        let header = RequestDecoder::new().read_head(&mut reader).await.unwrap().unwrap();
        assert_eq!(header.uri().path(), "/");
    }

    #[tokio::test]
    async fn closed_before_request() {
        let mut reader = RingReader::new(ChunkedReader::new("", 3));
        assert!(RequestDecoder::new().read_head(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn closed_inside_head() {
        let mut reader = RingReader::new(ChunkedReader::new("GET / HTTP/1.0\r\nHost: pho", 3));
        let result = RequestDecoder::new().read_head(&mut reader).await;
        assert!(matches!(result, Err(ParseError::UnexpectedEof { .. })));
    }

    #[tokio::test]
    async fn endless_header_line() {
        let raw = format!("GET / HTTP/1.0\r\nCookie: {}", "c".repeat(3 * MAX_HEADER_BYTES));
        let mut reader = RingReader::new(ChunkedReader::new(raw, 1000));
        let result = RequestDecoder::new().read_head(&mut reader).await;
        assert!(matches!(result, Err(ParseError::TooLargeHeader { .. })));
    }
}
