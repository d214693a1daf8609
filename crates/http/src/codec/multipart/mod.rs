//! Streaming `multipart/form-data` decoding.
//!
//! - [`BoundaryScanner`]: copies a part body to a sink up to its closing delimiter
//! - [`PartDecoder`]: walks the parts of a body and builds the [`Form`](crate::protocol::Form)
//! - [`decode_entities`]: undoes the numeric character references browsers put in
//!   names and values

mod boundary_scanner;
mod disposition;
mod entity;
mod part_decoder;

pub use boundary_scanner::BoundaryScanner;
pub use entity::decode_entities;
pub use part_decoder::{MAX_FIELD_BYTES, MAX_PART_HEADER_BYTES, PartDecoder};
