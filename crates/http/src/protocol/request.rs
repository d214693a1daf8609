//! HTTP request header handling implementation.
//!
//! This module wraps the standard `http::Request` type with the few questions the
//! server asks about an incoming request: is it a form post, which multipart boundary
//! does it declare, and which command suffix does its path carry.

use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use mime::Mime;

use crate::protocol::ParseError;

/// Represents an HTTP request header.
///
/// This struct wraps a `http::Request<()>` to provide:
/// - Access to standard HTTP header fields
/// - Body attachment capabilities
/// - Multipart boundary extraction
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    /// Attaches a body to this header, converting it into a full `Request<T>`.
    ///
    /// This is typically used after the form has been decoded to attach it.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Only POST requests carry a multipart form.
    pub fn need_form(&self) -> bool {
        *self.method() == Method::POST
    }

    /// The `?`-suffix of the path, used as a command rather than a query string.
    pub fn command(&self) -> Option<&str> {
        self.uri().query()
    }

    /// Extracts the `boundary=` parameter of a `multipart/form-data` content type.
    pub fn boundary(&self) -> Result<String, ParseError> {
        let value = self
            .headers()
            .get(CONTENT_TYPE)
            .ok_or_else(|| ParseError::missing_boundary("no content-type header"))?
            .to_str()
            .map_err(ParseError::missing_boundary)?;

        let content_type: Mime = value.parse().map_err(ParseError::missing_boundary)?;
        if content_type.type_() != mime::MULTIPART || content_type.subtype() != mime::FORM_DATA {
            return Err(ParseError::missing_boundary(format!("unsupported content type {content_type}")));
        }

        let boundary = content_type.get_param(mime::BOUNDARY).map(|name| name.as_str().trim_matches('"'));
        match boundary {
            Some(boundary) if !boundary.is_empty() => Ok(boundary.to_owned()),
            _ => Err(ParseError::missing_boundary("content type has no boundary parameter")),
        }
    }
}

/// Converts request parts into a RequestHeader.
impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
