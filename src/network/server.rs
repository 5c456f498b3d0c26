use std::future::Future;
use std::io;
use std::net::SocketAddr;

use prometheus::Registry;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    constants::{ACCEPT_ERROR_BACKOFF, HEALTHCHECK_PATH, METRICS_PATH},
    core::state::StateReader,
    error::ServerError,
    exposition,
    network::request::{HttpRequest, RequestParser},
    network::response::{ResponseBuilder, StatusCode},
};

/// Source of inbound connections for [`MetricsServer`].
pub trait Acceptor: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Serves `/metrics` and `/healthcheck` from snapshots of the cache.
pub struct MetricsServer<A = TcpListener> {
    acceptor: A,
    registry: Registry,
}

impl MetricsServer<TcpListener> {
    pub async fn bind(address: &str, reader: StateReader, namespace: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(address).await?;
        info!(address = %listener.local_addr()?, "metrics endpoint bound");
        Self::new(listener, reader, namespace)
    }
}

impl<A: Acceptor> MetricsServer<A> {
    pub fn new(acceptor: A, reader: StateReader, namespace: &str) -> Result<Self, ServerError> {
        Ok(MetricsServer {
            acceptor,
            registry: exposition::registry(reader, namespace)?,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.acceptor.local_addr()
    }

    /// Accepts connections until `shutdown` is cancelled.
    ///
    /// A failed accept is logged and retried after [`ACCEPT_ERROR_BACKOFF`].
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let (stream, addr) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.acceptor.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => continue,
                        }
                    }
                },
            };
            debug!(peer = %addr, "client connected");

            let registry = self.registry.clone();
            task::spawn(async move {
                if let Err(e) = handle_client(stream, registry).await {
                    warn!(peer = %addr, error = %e, "client handling error");
                }
            });
        }

        info!("metrics endpoint stopped");
    }
}

// one request per connection
async fn handle_client(mut stream: TcpStream, registry: Registry) -> Result<(), ServerError> {
    let (read_half, mut write_half) = stream.split();
    let mut buffered = BufReader::new(read_half);

    let response = match RequestParser::read_request(&mut buffered).await {
        Ok(Some(request)) => route(&request, &registry),
        Ok(None) => return Ok(()),
        Err(ServerError::IoError(e)) => return Err(ServerError::IoError(e)),
        Err(e) => {
            debug!(error = %e, "rejecting request");
            ResponseBuilder::build_error_response(StatusCode::BadRequest)
        }
    };

    write_half.write_all(&response).await?;
    write_half.shutdown().await?;
    Ok(())
}

fn route(request: &HttpRequest, registry: &Registry) -> Vec<u8> {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", METRICS_PATH) => match exposition::encode(registry) {
            Ok(body) => ResponseBuilder::build_metrics_response(body),
            Err(e) => {
                warn!(error = %e, "failed to encode metrics");
                ResponseBuilder::build_error_response(StatusCode::InternalServerError)
            }
        },
        ("GET", HEALTHCHECK_PATH) => ResponseBuilder::build_healthcheck_response(),
        (_, METRICS_PATH) | (_, HEALTHCHECK_PATH) => {
            ResponseBuilder::build_error_response(StatusCode::MethodNotAllowed)
        }
        _ => ResponseBuilder::build_error_response(StatusCode::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::state::shared_store;

    struct FlakyListener {
        listener: TcpListener,
        failures_left: Arc<AtomicUsize>,
    }

    impl Acceptor for FlakyListener {
        fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
            async move {
                let failing = self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if failing {
                    return Err(io::Error::from(io::ErrorKind::ConnectionAborted));
                }
                self.listener.accept().await
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.listener.local_addr()
        }
    }

    #[tokio::test]
    async fn keeps_serving_after_failed_accepts() {
        let failures_left = Arc::new(AtomicUsize::new(3));
        let acceptor = FlakyListener {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
            failures_left: Arc::clone(&failures_left),
        };
        let (_, reader) = shared_store(Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap())));
        let server = MetricsServer::new(acceptor, reader, "lk").unwrap();
        let addr = server.local_addr().unwrap();

        let shutdown = CancellationToken::new();
        let server_task = tokio::spawn(server.run(shutdown.clone()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /healthcheck HTTP/1.1\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(failures_left.load(Ordering::SeqCst), 0);

        shutdown.cancel();
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_interrupts_accept_backoff() {
        let acceptor = FlakyListener {
            listener: TcpListener::bind("127.0.0.1:0").await.unwrap(),
            failures_left: Arc::new(AtomicUsize::new(usize::MAX)),
        };
        let (_, reader) = shared_store(Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap())));
        let server = MetricsServer::new(acceptor, reader, "lk").unwrap();

        let shutdown = CancellationToken::new();
        let server_task = tokio::spawn(server.run(shutdown.clone()));
        tokio::task::yield_now().await;

        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), server_task)
            .await
            .unwrap()
            .unwrap();
    }
}
