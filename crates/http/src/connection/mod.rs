//! HTTP connection handling module
//!
//! # Components
//!
//! - [`HttpConnection`]: serves the single request of one connection:
//!   - Reads the request head through a ring buffer
//!   - Decodes the multipart form of POST requests
//!   - Streams the handler's response back and closes the write half

mod http_connection;

pub use http_connection::HttpConnection;
