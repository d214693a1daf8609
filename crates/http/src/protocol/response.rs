//! HTTP response header handling implementation.
//!
//! The header portion of a response is a standard `http::Response` with an empty body
//! placeholder; the body is streamed separately by the connection.

use http::Response;

/// Type alias for HTTP response headers.
pub type ResponseHead = Response<()>;
