//! HTTP header decoder implementation for parsing HTTP request heads
//!
//! This module decodes a request line and its header fields from raw bytes into a
//! [`RequestHeader`]. The connection collects the head line by line from its read
//! buffer and hands the complete block to [`HeaderDecoder`]; whatever follows the head
//! (a multipart body) stays in the read buffer.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only supports HTTP/1.0 and HTTP/1.1
//!
//! # Implementation Details
//!
//! The decoder records the byte ranges of header names and values while `httparse`
//! borrows the buffer, then builds the typed `http::Request` from slices of the frozen
//! header bytes without copying them.

use std::mem::MaybeUninit;

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, RequestHeader};

/// Maximum number of headers allowed in a request
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
///
/// This decoder parses raw bytes into a structured [`RequestHeader`], leaving any bytes
/// after the head in the buffer.
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = RequestHeader;
    type Error = ParseError;

    /// Attempts to decode HTTP headers from the provided bytes buffer.
    ///
    /// # Arguments
    ///
    /// * `src` - Mutable reference to the source bytes buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(header))` if a complete header was successfully parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - The number of headers exceeds `MAX_HEADER_NUM`
    /// - The total header size exceeds `MAX_HEADER_BYTES`
    /// - The HTTP version is not supported
    /// - Headers contain invalid characters
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // the shortest valid head is "GET / HTTP/1.0\r\n\r\n"
        if src.len() < 18 {
            return Ok(None);
        }

        let mut req = httparse::Request::new(&mut []);
        let mut headers: [MaybeUninit<httparse::Header>; MAX_HEADER_NUM] = [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];

        let parsed = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e),
        })?;

        let head_size = match parsed {
            Status::Complete(head_size) => head_size,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(head_size, "parsed request head");
        ensure!(head_size <= MAX_HEADER_BYTES, ParseError::too_large_header(head_size, MAX_HEADER_BYTES));

        let header_count = req.headers.len();
        let mut header_index = EMPTY_HEADER_INDEX_ARRAY;
        HeaderIndex::record(src, req.headers, &mut header_index);

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let mut builder = Request::builder()
            .method(req.method.ok_or(ParseError::InvalidMethod)?)
            .uri(req.path.ok_or(ParseError::InvalidUri)?)
            .version(version);

        let header_bytes = src.split_to(head_size).freeze();
        if let Some(headers) = builder.headers_mut() {
            headers.reserve(header_count);
            for index in &header_index[..header_count] {
                let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
                let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
                    .map_err(ParseError::invalid_header)?;
                headers.append(name, value);
            }
        }

        // the builder keeps the first invalid method or uri error until here
        let request = builder.body(()).map_err(|e| {
            trace!(cause = %e, "can't build request head");
            if e.is::<http::method::InvalidMethod>() { ParseError::InvalidMethod } else { ParseError::InvalidUri }
        })?;

        Ok(Some(RequestHeader::from(request)))
    }
}

/// Stores the byte range positions of a header's name and value within the original buffer.
///
/// This struct is used internally by the decoder to perform zero-copy parsing of headers
/// by recording the positions of header names and values rather than copying the data.
#[derive(Clone, Copy)]
struct HeaderIndex {
    /// Start and end byte positions of the header name
    pub(crate) name: (usize, usize),
    /// Start and end byte positions of the header value
    pub(crate) value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

const EMPTY_HEADER_INDEX_ARRAY: [HeaderIndex; MAX_HEADER_NUM] = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];

impl HeaderIndex {
    /// Records the byte positions of header names and values from the parsed headers.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The original bytes containing the headers
    /// * `headers` - Slice of parsed header references from httparse
    /// * `indices` - Mutable slice to store the recorded positions
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            let value_end = value_start + header.value.len();
            indices.value = (value_start, value_end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use indoc::indoc;

    #[test]
    fn browser_upload_head_leaves_body() {
        let str = indoc! {r##"
        POST /sdcard/DCIM HTTP/1.1
        Host: 192.168.1.20:8088
        Content-Type: multipart/form-data; boundary=----WebKitFormBoundaryQ2bV
        Content-Length: 1234
        Origin: http://192.168.1.20:8088

        ------WebKitFormBoundaryQ2bV"##};

        let mut buf = BytesMut::from(str);
        let header = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/sdcard/DCIM");
        assert_eq!(header.headers().len(), 4);
        assert_eq!(header.boundary().unwrap(), "----WebKitFormBoundaryQ2bV");
        assert_eq!(&buf[..], b"------WebKitFormBoundaryQ2bV");
    }

    #[test]
    fn http_10_get_with_command() {
        let mut buf = BytesMut::from("GET /sdcard?sort_2_1 HTTP/1.0\r\nUser-Agent: w3m/0.5.3\r\n\r\n");
        let header = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_10);
        assert_eq!(header.command(), Some("sort_2_1"));
        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("w3m/0.5.3")));
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_head_needs_more() {
        let mut buf = BytesMut::from("GET /sdcard HTTP/1.0\r\nHost: pho");
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from("GET /");
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_head() {
        let mut head = String::from("GET / HTTP/1.0\r\n");
        while head.len() <= MAX_HEADER_BYTES {
            // long values so the size limit trips before the header count limit
            head.push_str(&format!("X-Filler: {}\r\n", "a".repeat(400)));
        }

        let mut buf = BytesMut::from(head.as_str());
        assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn too_many_headers() {
        let mut head = String::from("GET / HTTP/1.0\r\n");
        for i in 0..=MAX_HEADER_NUM {
            head.push_str(&format!("X-{i}: v\r\n"));
        }
        head.push_str("\r\n");

        let mut buf = BytesMut::from(head.as_str());
        assert!(matches!(HeaderDecoder.decode(&mut buf), Err(ParseError::TooManyHeaders { .. })));
    }

    #[test]
    fn malformed_request_line() {
        let mut buf = BytesMut::from("GET / HTTP/2.0\r\nHost: phone\r\n\r\n");
        assert!(HeaderDecoder.decode(&mut buf).is_err());

        let mut buf = BytesMut::from("GET\r\nHost: phone\r\n\r\n\r\n");
        assert!(HeaderDecoder.decode(&mut buf).is_err());
    }
}
