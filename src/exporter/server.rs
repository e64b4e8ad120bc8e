//! Metrics listener
//!
//! A minimal hyper server exposing the registry in the Prometheus text
//! format:
//!
//! - `GET /metrics`: gather and encode (runs a scan)
//! - `/`: empty 200, for liveness checks
//! - `/healthz`: "ok"

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Result;

/// Bind `addr` and serve metrics until the listener fails.
pub async fn run_metrics_server(addr: SocketAddr, registry: Registry) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", listener.local_addr()?);
    serve(listener, registry).await
}

/// Serve metrics on an already bound listener.
pub async fn serve(listener: TcpListener, registry: Registry) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "accepted metrics connection");

        let io = TokioIo::new(stream);
        let registry = registry.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, registry.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    registry: Registry,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let is_get = *req.method() == Method::GET;
    let path = req.uri().path().to_owned();
    drop(req);

    let response = match path.as_str() {
        "/metrics" if is_get => metrics(registry).await,
        "/" => text(StatusCode::OK, ""),
        "/healthz" => text(StatusCode::OK, "ok"),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response)
}

async fn metrics(registry: Registry) -> Response<Full<Bytes>> {
    // Gathering blocks on a scan, keep it off the runtime workers.
    let encoded = tokio::task::spawn_blocking(move || {
        let families = registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map(|()| buffer)
    })
    .await;

    match encoded {
        Ok(Ok(buffer)) => {
            let mut response = Response::new(Full::new(Bytes::from(buffer)));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(prometheus::TEXT_FORMAT));
            response
        }
        Ok(Err(e)) => {
            error!(error = %e, "failed to encode metrics");
            text(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics")
        }
        Err(e) => {
            error!(error = %e, "metrics gathering task failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, "failed to gather metrics")
        }
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
