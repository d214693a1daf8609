//! Request handler abstraction.
//!
//! A [`Handler`] receives every request as an `http::Request<Form>`: GET requests carry
//! an empty [`Form`], POST requests the decoded multipart content. Plain async
//! functions become handlers through [`make_handler`].

use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;

use crate::protocol::{Form, RequestHeader};

#[async_trait]
pub trait Handler: Send + Sync {
    type RespBody: Body<Data = Bytes, Error: Display + Send> + Send + Unpin;
    type Error: Into<Box<dyn Error + Send + Sync>> + Send;

    async fn call(&self, req: Request<Form>) -> Result<Response<Self::RespBody>, Self::Error>;

    /// Directory the uploads of a POST request are spooled into.
    ///
    /// Spooling next to the final destination lets an upload be persisted with a rename.
    async fn upload_dir(&self, header: &RequestHeader) -> PathBuf {
        let _ = header;
        std::env::temp_dir()
    }
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body<Data = Bytes> + Send + Unpin,
    RespBody::Error: Display + Send,
    F: Fn(Request<Form>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<Form>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<Form>) -> Ret,
{
    HandlerFn { f }
}
