//! HTTP codec module for reading requests and writing responses
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RingReader`]: Buffered reader over the read half of a connection
//!   - [`RequestDecoder`]: Reads the request head line by line
//!   - [`multipart`]: Streams a `multipart/form-data` body into a form
//!
//! - Response handling:
//!   - [`ResponseEncoder`]: Encodes outgoing HTTP responses
//!   - Header encoding via the `header` module
//!   - Payload encoding via the `body` module

mod body;
mod header;
pub mod multipart;
mod request_decoder;
mod response_encoder;
mod ring_reader;

pub use header::{MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
pub use ring_reader::{DEFAULT_CAPACITY, RingReader};
