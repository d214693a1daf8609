//! HTTP header processing module for encoding and decoding headers
//!
//! # Components
//!
//! - [`HeaderDecoder`]: Decodes a complete request head from raw bytes
//!   - Supports HTTP/1.0 and HTTP/1.1 request lines
//!   - Enforces header count and size limits
//!
//! - [`HeaderEncoder`]: Encodes response heads to bytes
//!   - Writes the status line in the response's HTTP version
//!   - Manages the content-length header according to the payload size

mod header_decoder;
mod header_encoder;

pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use header_encoder::HeaderEncoder;
