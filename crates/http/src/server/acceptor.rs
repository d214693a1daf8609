use std::io;
use std::net::{IpAddr, SocketAddr};
use std::ops::Range;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::WorkerPool;

/// Ports tried when none are configured, first one free wins.
pub const DEFAULT_PORTS: Range<u16> = 8088..8098;

/// Binds a listener to the first port of `ports` that is free on `host`.
///
/// Ports are tried in ascending order; the end of the range is exclusive.
pub async fn bind_first_free(host: IpAddr, ports: Range<u16>) -> io::Result<TcpListener> {
    let mut last_error = None;

    for port in ports.clone() {
        match TcpListener::bind(SocketAddr::new(host, port)).await {
            Ok(listener) => {
                info!(%host, port, "start listening");
                return Ok(listener);
            }
            Err(e) => {
                debug!(%host, port, cause = %e, "port not available");
                last_error = Some(e);
            }
        }
    }

    let reason = match last_error {
        Some(e) => format!("no free port in {}..{} on {host}, last error: {e}", ports.start, ports.end),
        None => format!("empty port range {}..{}", ports.start, ports.end),
    };
    Err(io::Error::new(io::ErrorKind::AddrInUse, reason))
}

/// Accepts connections forever, handing each one to `pool`.
///
/// A connection arriving while every worker is busy is closed without a response.
pub async fn serve(listener: TcpListener, pool: WorkerPool<TcpStream>) {
    loop {
        let (tcp_stream, remote_addr) = match listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        match pool.dispatch(tcp_stream) {
            Ok(worker) => debug!(%remote_addr, worker, "dispatched connection"),
            Err(tcp_stream) => {
                warn!(%remote_addr, workers = pool.size(), "all workers busy, dropping connection");
                drop(tcp_stream);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::Form;
    use bytes::Bytes;
    use http::{Request, Response};
    use http_body_util::Full;
    use std::convert::Infallible;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn skips_taken_ports() {
        let taken = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();
        if port > u16::MAX - 8 {
            return;
        }

        let listener = bind_first_free(LOCALHOST, port..port + 8).await.unwrap();
        let bound = listener.local_addr().unwrap().port();
        assert!(bound > port && bound < port + 8);
    }

    #[tokio::test]
    async fn exhausted_range() {
        let taken = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let error = bind_first_free(LOCALHOST, port..port + 1).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::AddrInUse);

        let error = bind_first_free(LOCALHOST, 10..10).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::AddrInUse);
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let handler = Arc::new(make_handler(|request: Request<Form>| async move {
            let body = format!("hello {}", request.uri().path());
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
        }));

        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, WorkerPool::start(2, handler)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /sdcard HTTP/1.0\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello /sdcard"));

        server.abort();
    }
}
