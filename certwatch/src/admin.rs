//! Admin server serving metrics and probes.
//!
//! The server answers:
//!
//! - `/` and `/metrics` with the registry encoded in the OpenMetrics text format;
//! - `/live` once the process is running;
//! - `/ready` once the first scan has been recorded.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{body::Incoming, header, Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use prometheus_client::registry::Registry;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, Instrument};

type Body = Full<Bytes>;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Command-line arguments used to configure an admin server
#[derive(Clone, Debug, clap::Args)]
pub struct AdminArgs {
    /// The admin server's address
    #[clap(long, default_value = "0.0.0.0:2112")]
    pub admin_addr: SocketAddr,
}

/// Supports configuring an admin server
#[derive(Debug)]
pub struct Builder {
    addr: SocketAddr,
    ready: Readiness,
    prometheus: Prometheus,
}

/// A bound admin server that is not yet accepting connections
#[derive(Debug)]
pub struct Bound {
    local_addr: SocketAddr,
    listener: TcpListener,
    ready: Readiness,
    prometheus: Prometheus,
}

/// Controls how the admin server advertises readiness
#[derive(Clone, Debug)]
pub struct Readiness(Arc<AtomicBool>);

/// A handle to a running admin server
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
    ready: Readiness,
    task: tokio::task::JoinHandle<()>,
}

/// Describes an error that occurred while binding the admin server
#[derive(Debug, Error)]
pub enum Error {
    /// An error occurred while binding the server
    #[error("failed to bind {0:?}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    /// An error occurred while reading the bound local address
    #[error("failed to get bound local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

#[derive(Clone, Debug)]
struct Prometheus(Arc<Registry>);

// === impl AdminArgs ===

impl Default for AdminArgs {
    fn default() -> Self {
        Self {
            admin_addr: SocketAddr::from(([0, 0, 0, 0], 2112)),
        }
    }
}

impl AdminArgs {
    /// Creates a new [`Builder`] from the command-line arguments
    pub fn into_builder(self, registry: Registry) -> Builder {
        Builder::new(self.admin_addr, registry)
    }
}

// === impl Builder ===

impl Builder {
    /// Creates a new [`Builder`] with the given server address and metrics registry
    ///
    /// The server starts unready by default and it's up to the caller to mark it as ready.
    pub fn new(addr: SocketAddr, registry: Registry) -> Self {
        Self {
            addr,
            ready: Readiness::default(),
            prometheus: Prometheus(Arc::new(registry)),
        }
    }

    /// Binds the admin server without accepting connections
    pub async fn bind(self) -> Result<Bound, Error> {
        let Self {
            addr,
            ready,
            prometheus,
        } = self;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Bind(addr, e))?;
        let local_addr = listener.local_addr().map_err(Error::LocalAddr)?;

        Ok(Bound {
            local_addr,
            listener,
            ready,
            prometheus,
        })
    }
}

// === impl Bound ===

impl Bound {
    /// Runs the server on a background task, returning a handle
    ///
    /// Each connection is served on its own task, so a slow scrape never
    /// holds up other requests.
    pub fn spawn(self) -> Server {
        let Self {
            local_addr,
            listener,
            ready,
            prometheus,
        } = self;

        let task = tokio::spawn(
            serve(listener, ready.clone(), prometheus)
                .instrument(info_span!("admin", port = %local_addr.port())),
        );

        Server {
            addr: local_addr,
            ready,
            task,
        }
    }
}

async fn serve(listener: TcpListener, ready: Readiness, prometheus: Prometheus) {
    debug!("Serving");
    loop {
        let (tcp, client) = match listener.accept().await {
            Ok(conn) => conn,
            Err(error) => {
                info!(%error, "Failed to accept connection");
                continue;
            }
        };

        let ready = ready.clone();
        let prometheus = prometheus.clone();
        tokio::spawn(
            async move {
                let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                    let rsp = route(&ready, &prometheus, &req);
                    async move { Ok::<_, Infallible>(rsp) }
                });

                let res = hyper::server::conn::http1::Builder::new()
                    .timer(TokioTimer::new())
                    // Allow weird clients (like netcat).
                    .half_close(true)
                    // Prevent port scanners, etc, from holding connections open.
                    .header_read_timeout(Duration::from_secs(2))
                    // Use a small buffer, since we don't really transfer much data.
                    .max_buf_size(8 * 1024)
                    .serve_connection(TokioIo::new(tcp), svc)
                    .await;
                if let Err(error) = res {
                    debug!(%error, "Connection closed");
                }
            }
            .instrument(info_span!("conn", %client)),
        );
    }
}

fn route(ready: &Readiness, prometheus: &Prometheus, req: &Request<Incoming>) -> Response<Body> {
    match req.uri().path() {
        "/" | "/metrics" => prometheus.respond(req),
        "/live" => handle_live(req),
        "/ready" => handle_ready(ready, req),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::default())
            .expect("valid response"),
    }
}

// === impl Readiness ===

impl Default for Readiness {
    /// Starts unready
    fn default() -> Self {
        Self(Arc::new(false.into()))
    }
}

impl Readiness {
    /// Gets the current readiness state
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sets the readiness state
    pub fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
    }
}

// === impl Server ===

impl Server {
    /// Returns the bound local address of the server
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns a readiness handle
    pub fn readiness(&self) -> Readiness {
        self.ready.clone()
    }

    /// Returns the server tasks's join handle
    pub fn into_join_handle(self) -> tokio::task::JoinHandle<()> {
        self.task
    }
}

// === impl Prometheus ===

impl Prometheus {
    fn respond<B>(&self, req: &Request<B>) -> Response<Body> {
        match *req.method() {
            Method::GET | Method::HEAD => {
                let mut buf = String::new();
                match prometheus_client::encoding::text::encode(&mut buf, &self.0) {
                    Ok(()) => Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)
                        .body(Body::from(buf))
                        .expect("valid response"),

                    Err(error) => {
                        info!(%error, "Failed to encode metrics");
                        Response::builder()
                            .status(StatusCode::INTERNAL_SERVER_ERROR)
                            .body(Body::default())
                            .expect("valid response")
                    }
                }
            }

            _ => method_not_allowed(),
        }
    }
}

// === handlers ===

fn handle_live<B>(req: &Request<B>) -> Response<Body> {
    match *req.method() {
        Method::GET | Method::HEAD => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("alive\n"))
            .expect("valid response"),
        _ => method_not_allowed(),
    }
}

fn handle_ready<B>(Readiness(ready): &Readiness, req: &Request<B>) -> Response<Body> {
    match *req.method() {
        Method::GET | Method::HEAD => {
            if ready.load(Ordering::Acquire) {
                return Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("ready\n"))
                    .expect("valid response");
            }

            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("not ready\n"))
                .expect("valid response")
        }
        _ => method_not_allowed(),
    }
}

fn method_not_allowed() -> Response<Body> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(header::ALLOW, "GET, HEAD")
        .body(Body::default())
        .expect("valid response")
}
