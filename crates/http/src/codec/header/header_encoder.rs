//! HTTP header encoder implementation for serializing HTTP response heads
//!
//! The status line is written in the version the response carries, HTTP/1.0 for
//! everything this server answers. The `Content-Length` header is derived from the
//! payload size; a body delimited by closing the connection carries none.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Writes the status line and header fields of `item` into `dst`.
    ///
    /// # Errors
    ///
    /// Fails for response versions other than HTTP/1.0 and HTTP/1.1.
    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        let version = match header.version() {
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        let status = header.status();
        write!(FastWrite(dst), "{} {} {}\r\n", version, status.as_str(), status.canonical_reason().unwrap_or(""))?;

        match payload_size {
            PayloadSize::Length(n) => {
                header.headers_mut().insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Empty => {
                const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
                header.headers_mut().insert(header::CONTENT_LENGTH, ZERO_VALUE);
            }
            PayloadSize::UntilClose => {
                header.headers_mut().remove(header::CONTENT_LENGTH);
            }
        }

        for (header_name, header_value) in header.headers().iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Fast writer implementation for writing to BytesMut.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn http_10_with_length() {
        let head = Response::builder()
            .version(Version::HTTP_10)
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(())
            .unwrap();

        assert_eq!(
            encode(head, PayloadSize::Length(42)),
            "HTTP/1.0 200 OK\r\ncontent-type: text/html; charset=utf-8\r\ncontent-length: 42\r\n\r\n"
        );
    }

    #[test]
    fn until_close_drops_content_length() {
        let head = Response::builder()
            .version(Version::HTTP_10)
            .status(StatusCode::NOT_FOUND)
            .header(header::CONTENT_LENGTH, "7")
            .body(())
            .unwrap();

        assert_eq!(encode(head, PayloadSize::UntilClose), "HTTP/1.0 404 Not Found\r\n\r\n");
    }

    #[test]
    fn empty_body() {
        let head = Response::builder().version(Version::HTTP_10).status(StatusCode::BAD_REQUEST).body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Empty), "HTTP/1.0 400 Bad Request\r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn http_2_rejected() {
        let head = Response::builder().version(Version::HTTP_2).body(()).unwrap();
        let mut dst = BytesMut::new();
        assert!(HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst).is_err());
    }
}
