use std::error::Error;
use std::fmt::Display;

use bytes::Bytes;
use futures::SinkExt;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info};

use crate::codec::multipart::PartDecoder;
use crate::codec::{DEFAULT_CAPACITY, RequestDecoder, ResponseEncoder, RingReader};
use crate::handler::Handler;
use crate::protocol::{Form, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

/// One request/response exchange over a connection.
///
/// `HttpConnection` reads the request head and, for POST requests, the multipart form
/// from the read half, calls the handler, writes the response to the write half and
/// shuts the write half down. A connection never carries a second request.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    reader: RingReader<R>,
    request_decoder: RequestDecoder,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_capacity(reader, writer, DEFAULT_CAPACITY)
    }

    /// Creates a connection whose read buffer holds `capacity` bytes.
    pub fn with_capacity(reader: R, writer: W, capacity: usize) -> Self {
        Self {
            reader: RingReader::with_capacity(reader, capacity),
            request_decoder: RequestDecoder::new(),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    /// Serves the single request of this connection.
    ///
    /// Malformed requests are answered with a plain-text diagnostic before the error is
    /// returned; a peer that closes without sending anything is not an error.
    pub async fn process<H: Handler>(mut self, handler: &H) -> Result<(), HttpError> {
        let header = match self.request_decoder.read_head(&mut self.reader).await {
            Ok(Some(header)) => header,
            Ok(None) => {
                debug!("peer closed before sending a request");
                return Ok(());
            }
            Err(e) => {
                error!(cause = %e, "can't read request head");
                self.send_parse_error(&e).await?;
                return Err(e.into());
            }
        };

        info!(method = %header.method(), path = header.uri().path(), "received request");

        let form = if header.need_form() {
            match self.read_form(&header, handler).await {
                Ok(form) => form,
                Err(e) => {
                    error!(cause = %e, path = header.uri().path(), "can't decode form");
                    self.send_parse_error(&e).await?;
                    return Err(e.into());
                }
            }
        } else {
            Form::new()
        };

        let response = handler.call(header.body(form)).await;
        self.send_response(response).await?;
        self.shutdown().await
    }

    async fn read_form<H: Handler>(&mut self, header: &RequestHeader, handler: &H) -> Result<Form, ParseError> {
        let boundary = header.boundary()?;
        let upload_dir = handler.upload_dir(header).await;
        debug!(boundary = %boundary, upload_dir = %upload_dir.display(), "decoding multipart form");

        let mut decoder = PartDecoder::new(&boundary, upload_dir, self.reader.capacity())?;
        decoder.decode(&mut self.reader).await
    }

    async fn send_parse_error(&mut self, e: &ParseError) -> Result<(), HttpError> {
        let status = if e.is_server_side() { StatusCode::INTERNAL_SERVER_ERROR } else { StatusCode::BAD_REQUEST };
        self.do_send_response(build_error_response(status, &e.to_string())).await?;
        self.shutdown().await
    }

    async fn send_response<T, E>(&mut self, response_result: Result<Response<T>, E>) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        match response_result {
            Ok(response) => self.do_send_response(response).await,
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "request handler failed");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                self.do_send_response(build_error_response(status, "request handler failed")).await
            }
        }
    }

    async fn do_send_response<T>(&mut self, response: Response<T>) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let (mut header_parts, mut body) = response.into_parts();
        header_parts.version = Version::HTTP_10;

        let payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::UntilClose,
        };

        let header = Message::<_, T::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        if payload_size.is_empty() {
            // nothing follows the head, so flush it right away
            self.framed_write.send(header).await?;
        } else {
            self.framed_write.feed(header).await?;
        }

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    // trailers have no HTTP/1.0 representation
                    let Ok(data) = frame.into_data() else { continue };

                    self.framed_write
                        .send(Message::Payload(PayloadItem::Chunk(data)))
                        .await
                        .map_err(|e| SendError::invalid_body(format!("can't send response: {e}")))?;
                }
                Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}")).into()),
                None => {
                    self.framed_write
                        .feed(Message::Payload(PayloadItem::<T::Data>::Eof))
                        .await
                        .map_err(|e| SendError::invalid_body(format!("can't send eof response: {e}")))?;
                    return Ok(());
                }
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), HttpError> {
        SinkExt::<Message<(ResponseHead, PayloadSize)>>::flush(&mut self.framed_write).await?;
        self.framed_write.get_mut().shutdown().await.map_err(SendError::io)?;
        Ok(())
    }
}

fn build_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = format!("{} {}\r\n{message}\r\n", status.as_str(), status.canonical_reason().unwrap_or(""));

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
