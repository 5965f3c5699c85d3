//! # HTTP Server
//!
//! Hyper HTTP/1 front end for a [`Dispatcher`].
//!
//! ## Key Features
//!
//! - One task per connection on the Tokio runtime
//! - Graceful shutdown on Ctrl-C or a caller-supplied signal
//! - Live connections told to close after their in-flight request, then
//!   drained up to `shutdown_timeout_secs`
//! - Request bodies capped at `max_body_size`

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Grace period for in-flight connections on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            max_body_size: 1024 * 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Shutdown grace period
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// HTTP server
#[derive(Debug, Clone)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl Server {
    /// Server for a booted dispatcher
    #[must_use]
    pub fn new(dispatcher: Dispatcher, config: ServerConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config,
        }
    }

    /// Server configuration
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` when the socket cannot be set up.
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        #[cfg(not(windows))]
        {
            socket.set_reuseport(true).map_err(bind_error)?;
        }
        socket.bind(addr).map_err(bind_error)?;
        socket.listen(1024).map_err(bind_error)
    }

    /// Serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` when the address cannot be bound.
    pub async fn serve(&self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` when the address cannot be bound.
    pub async fn serve_with_shutdown(&self, signal: impl Future<Output = ()>) -> Result<()> {
        let listener = self.bind()?;
        self.serve_listener(listener, signal).await
    }

    /// Serve connections from an already bound listener until `signal` resolves
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` when the listener address cannot be read.
    pub async fn serve_listener(
        &self,
        listener: TcpListener,
        signal: impl Future<Output = ()>,
    ) -> Result<()> {
        info!("Server listening on http://{}", listener.local_addr()?);

        let active = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let max_body_size = self.config.max_body_size;
                    let keep_alive = self.config.keep_alive;
                    let active = Arc::clone(&active);
                    let shutdown = shutdown.clone();

                    active.fetch_add(1, Ordering::Relaxed);
                    tokio::task::spawn(async move {
                        let service = service_fn(move |req| {
                            let dispatcher = Arc::clone(&dispatcher);
                            async move {
                                Ok::<_, Infallible>(
                                    handle_request(req, &dispatcher, remote_addr, max_body_size).await,
                                )
                            }
                        });
                        let conn = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service);
                        tokio::pin!(conn);
                        let served = tokio::select! {
                            served = conn.as_mut() => served,
                            () = shutdown.cancelled() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(err) = served {
                            debug!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut signal => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }
        shutdown.cancel();

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout(), drain)
            .await
            .is_err()
        {
            warn!(
                remaining = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with open connections"
            );
        }
        Ok(())
    }
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    dispatcher: &Dispatcher,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> hyper::Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let version = req.version();

    let response = match Request::from_hyper_with_limit(req, max_body_size).await {
        Ok(mut request) => {
            request.set_header("x-client-ip", &remote_addr.ip().to_string());
            dispatcher.dispatch(request).await
        }
        Err(e) => {
            warn!(code = e.code(), error = %e, "Failed to read request");
            Response::from_error(&e)
        }
    };

    info!(
        "    {} - \"{} {} {:?}\" {}",
        remote_addr, method, path, version, response.status
    );
    response.into_hyper()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
