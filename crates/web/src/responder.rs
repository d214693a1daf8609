//! Conversion of handler results into HTTP responses.
//!
//! Every page and error of the file manager implements [`Responder`], so an action can
//! simply return `Result<Html, ErrorPage>` and let the handler turn it into a response.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};

use crate::body::ResponseBody;

/// A trait for types that can be converted into HTTP responses.
pub trait Responder {
    fn response_to(self) -> Response<ResponseBody>;
}

/// Implementation for Result allows handlers to return Result types directly.
/// The Ok and Err variants must both implement Responder.
impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self) -> Response<ResponseBody> {
        match self {
            Ok(t) => t.response_to(),
            Err(e) => e.response_to(),
        }
    }
}

/// Pre-built responses pass through unchanged.
impl Responder for Response<ResponseBody> {
    fn response_to(self) -> Response<ResponseBody> {
        self
    }
}

/// Implementation for (StatusCode, T) tuple allows setting a status code
/// along with the response content.
impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.response_to();
        *response.status_mut() = status;
        response
    }
}

/// A rendered HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Html(pub String);

impl Responder for Html {
    fn response_to(self) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::from(self.0));
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        response
    }
}
