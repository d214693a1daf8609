//! Core HTTP protocol abstractions.
//!
//! This module provides the types exchanged between the codec layer, the connection
//! and request handlers.
//!
//! # Architecture
//!
//! - **Message Handling** ([`message`]): Core message types for response streaming
//!   - [`Message`]: Represents either headers or payload chunks
//!   - [`PayloadItem`]: Handles individual payload chunks and EOF
//!   - [`PayloadSize`]: Tracks payload size information
//!
//! - **Request Processing** ([`request`]): Request header handling
//!   - [`RequestHeader`]: Wraps HTTP request headers with boundary and command access
//!
//! - **Form Content** ([`form`]): What a POST request decodes to
//!   - [`Form`]: Ordered field table, checked names and uploads
//!   - [`Upload`]: A spooled upload that cleans up after itself
//!
//! - **Response Processing** ([`response`]): Response header handling
//!   - [`ResponseHead`]: Type alias for response headers before body attachment
//!
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Request parsing errors
//!   - [`SendError`]: Response sending errors

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod form;
pub use form::CHECKED;
pub use form::Form;
pub use form::Upload;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
