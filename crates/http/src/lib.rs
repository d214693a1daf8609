//! The transport core of webphone, a browser-driven file manager server.
//!
//! This crate serves exactly one request per TCP connection on top of tokio. Its work is
//! getting the request off the wire: a ring-buffered reader, an HTTP/1.x head decoder
//! and a streaming `multipart/form-data` decoder that spools uploads to disk without
//! ever holding a whole file in memory. Connections are dispatched to a fixed pool of
//! workers that refuses clients rather than queueing them.
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use webphone_http::handler::make_handler;
//! use webphone_http::protocol::Form;
//! use webphone_http::server::{DEFAULT_PORTS, WorkerPool, bind_first_free, serve};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let handler = Arc::new(make_handler(|request: Request<Form>| async move {
//!         let fields = request.body().fields().len();
//!         Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(format!("{fields} fields\r\n")))))
//!     }));
//!
//!     let listener = bind_first_free(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORTS).await?;
//!     serve(listener, WorkerPool::start(4, handler)).await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: ring buffer reader, request head decoding, multipart decoding and
//!   response encoding
//! - [`protocol`]: request header, form, message and error types
//! - [`connection`]: one request/response exchange over a connection
//! - [`handler`]: the trait the file manager implements
//! - [`server`]: worker pool and accept loop
//!
//! # Limitations
//!
//! - One request per connection, responses are HTTP/1.0
//! - Request bodies are only read for `multipart/form-data` POST requests
//! - No TLS, no timeouts: a peer that stops sending holds its worker
//! - Maximum request head size: 8KB, maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
