//! Response payload encoding.
//!
//! Every response is the only one on its connection, so a body is framed either by a
//! `Content-Length` header or by closing the connection after the last byte.
//!
//! # Components
//!
//! - [`PayloadEncoder`]: selects the framing for one response
//! - `LengthEncoder`: writes at most the announced number of bytes
//! - `UntilCloseEncoder`: passes bytes through until the end of the body

mod length_encoder;
mod payload_encoder;
mod until_close_encoder;

pub use payload_encoder::PayloadEncoder;
