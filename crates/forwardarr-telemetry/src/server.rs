//! HTTP status server
//!
//! Serves four routes for container orchestration and scraping:
//!
//! | Route      | Success              | Failure                                   |
//! |------------|----------------------|-------------------------------------------|
//! | `/health`  | `200 OK`             | `503 Service not running` during shutdown |
//! | `/ready`   | `200 Ready`          | `503 qBittorrent not reachable`           |
//! | `/status`  | `200` JSON document  |                                           |
//! | `/metrics` | Prometheus text      | `500` if encoding fails                   |
//!
//! Anything else is `404 Not Found`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forwardarr_core::ports::ITorrentClient;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::MetricsRegistry;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Body of `GET /status`
#[derive(Debug, Serialize)]
struct StatusReport {
    status: &'static str,
    version: &'static str,
    qbittorrent_reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_port: Option<u16>,
}

/// Everything a request handler needs, cloned into each connection task
#[derive(Clone)]
struct ServerState {
    metrics: Arc<MetricsRegistry>,
    client: Arc<dyn ITorrentClient>,
    running: Arc<AtomicBool>,
}

/// HTTP server exposing health, readiness, status and metrics.
pub struct StatusServer {
    state: ServerState,
    addr: SocketAddr,
}

impl StatusServer {
    /// Creates a new `StatusServer`.
    ///
    /// # Arguments
    /// * `metrics` - The shared metrics registry
    /// * `client` - Torrent client checked by `/ready` and `/status`
    /// * `endpoint` - Address to bind, e.g. `"0.0.0.0:9090"`
    pub fn new(
        metrics: Arc<MetricsRegistry>,
        client: Arc<dyn ITorrentClient>,
        endpoint: &str,
    ) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        Ok(Self {
            state: ServerState {
                metrics,
                client,
                running: Arc::new(AtomicBool::new(true)),
            },
            addr,
        })
    }

    /// Flag reported by `/health`; clear it when shutdown begins.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.state.running)
    }

    /// Starts the HTTP server. This future runs until the provided
    /// cancellation token is triggered.
    ///
    /// Should be spawned as a background task.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Status server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, _) = result?;
                    let io = TokioIo::new(stream);
                    let state = self.state.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                            let state = state.clone();
                            async move {
                                Ok::<_, hyper::Error>(route(req.uri().path(), &state).await)
                            }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "Status HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    self.state.running.store(false, Ordering::SeqCst);
                    info!("Status server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Dispatch a request path to its handler.
async fn route(path: &str, state: &ServerState) -> Response<Full<Bytes>> {
    match path {
        "/health" => health(state),
        "/ready" => ready(state).await,
        "/status" => status(state).await,
        "/metrics" => metrics(state),
        _ => respond(StatusCode::NOT_FOUND, TEXT_PLAIN, "Not Found"),
    }
}

fn health(state: &ServerState) -> Response<Full<Bytes>> {
    if state.running.load(Ordering::SeqCst) {
        respond(StatusCode::OK, TEXT_PLAIN, "OK")
    } else {
        respond(
            StatusCode::SERVICE_UNAVAILABLE,
            TEXT_PLAIN,
            "Service not running",
        )
    }
}

async fn ready(state: &ServerState) -> Response<Full<Bytes>> {
    match state.client.ping().await {
        Ok(()) => respond(StatusCode::OK, TEXT_PLAIN, "Ready"),
        Err(e) => {
            debug!(error = %e, "Readiness check failed");
            respond(
                StatusCode::SERVICE_UNAVAILABLE,
                TEXT_PLAIN,
                "qBittorrent not reachable",
            )
        }
    }
}

async fn status(state: &ServerState) -> Response<Full<Bytes>> {
    let report = StatusReport {
        status: if state.running.load(Ordering::SeqCst) {
            "running"
        } else {
            "stopping"
        },
        version: env!("CARGO_PKG_VERSION"),
        qbittorrent_reachable: state.client.ping().await.is_ok(),
        current_port: state.metrics.current_port_value(),
    };

    match serde_json::to_vec(&report) {
        Ok(body) => respond(StatusCode::OK, APPLICATION_JSON, body),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            TEXT_PLAIN,
            format!("Failed to encode status: {e}"),
        ),
    }
}

fn metrics(state: &ServerState) -> Response<Full<Bytes>> {
    match state.metrics.encode() {
        Ok(body) => respond(StatusCode::OK, PROMETHEUS_TEXT, body),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            TEXT_PLAIN,
            format!("Failed to encode metrics: {e}"),
        ),
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
