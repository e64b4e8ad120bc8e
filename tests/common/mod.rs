//! Fixture servers for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::LOCATION;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::crypto::ring::default_provider;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use hostchecker::checker::client_builder;
use hostchecker::collector::{MetricSample, LABEL_SITE_NAME};

/// Path that answers with a redirect to `/`
pub const REDIRECT_PATH: &str = "/redirect";

/// Path that answers with a body of [`LARGE_BODY_LEN`] bytes
pub const LARGE_BODY_PATH: &str = "/large";

pub const LARGE_BODY_LEN: usize = 64 * 1024 * 1024;

fn respond(path: &str, code: u16) -> Response<Full<Bytes>> {
    if path == LARGE_BODY_PATH {
        return Response::builder()
            .status(StatusCode::from_u16(code).unwrap())
            .body(Full::new(Bytes::from(vec![b'x'; LARGE_BODY_LEN])))
            .unwrap();
    }
    if path == REDIRECT_PATH {
        return Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, "/")
            .body(Full::new(Bytes::new()))
            .unwrap();
    }
    Response::builder()
        .status(StatusCode::from_u16(code).unwrap())
        .body(Full::new(Bytes::from_static(b"hello")))
        .unwrap()
}

fn serve_connection<S>(stream: S, status: Arc<AtomicU16>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let service = service_fn(move |req: Request<Incoming>| {
            let code = status.load(Ordering::SeqCst);
            let path = req.uri().path().to_owned();
            async move { Ok::<_, Infallible>(respond(&path, code)) }
        });
        let _ = http1::Builder::new()
            .serve_connection(TokioIo::new(stream), service)
            .await;
    });
}

/// Plain HTTP server answering every request with a switchable status code.
pub struct StatusServer {
    pub addr: SocketAddr,
    status: Arc<AtomicU16>,
    handle: JoinHandle<()>,
}

impl StatusServer {
    pub async fn start(code: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = Arc::new(AtomicU16::new(code));

        let shared = Arc::clone(&status);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                serve_connection(stream, Arc::clone(&shared));
            }
        });

        Self {
            addr,
            status,
            handle,
        }
    }

    pub fn set_status(&self, code: u16) {
        self.status.store(code, Ordering::SeqCst);
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// HTTPS server with a freshly generated self-signed certificate.
pub struct TlsServer {
    pub addr: SocketAddr,
    pub certificate: reqwest::Certificate,
    handle: JoinHandle<()>,
}

impl TlsServer {
    pub async fn start(code: u16) -> Self {
        let certified = rcgen::generate_simple_self_signed(vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ])
        .unwrap();
        let cert_der = certified.cert.der().clone();
        let key_der =
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

        let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = Arc::new(AtomicU16::new(code));

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let status = Arc::clone(&status);
                tokio::spawn(async move {
                    if let Ok(tls) = acceptor.accept(stream).await {
                        serve_connection(tls, status);
                    }
                });
            }
        });

        Self {
            addr,
            certificate: reqwest::Certificate::from_der(&cert_der).unwrap(),
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("https://{}/", self.addr)
    }

    /// A checker client that trusts this server's certificate
    pub fn client(&self) -> reqwest::Client {
        client_builder(Duration::from_secs(5))
            .add_root_certificate(self.certificate.clone())
            .build()
            .unwrap()
    }
}

impl Drop for TlsServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Accepts connections and never answers on them.
pub struct SilentServer {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SilentServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });

        Self { addr, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

impl Drop for SilentServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An address nothing listens on
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Samples for one site as (name, value) pairs
pub fn site_samples(samples: &[MetricSample], site: &str) -> Vec<(&'static str, f64)> {
    samples
        .iter()
        .filter(|s| s.label(LABEL_SITE_NAME) == Some(site))
        .map(|s| (s.name, s.value))
        .collect()
}
