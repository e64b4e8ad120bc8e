//! HTTP(S) checker
//!
//! Sends one request per check with redirects disabled, measures the time to
//! response headers and, for TLS connections, reads the expiry of the leaf
//! certificate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::redirect::Policy;
use reqwest::tls::TlsInfo;
use reqwest::{Client, ClientBuilder, Method, Request};
use thiserror::Error;
use tracing::{debug, info, warn};
use x509_parser::error::X509Error;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::{CheckError, CheckOutcome, Checker, Target};
use crate::error::{Error, Result};

/// Default request timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client settings every HTTP checker relies on.
///
/// Redirects are never followed: a 3xx is the response being checked. TLS
/// info is kept on every response so the peer certificate can be inspected.
/// Certificate verification stays on, so an expired certificate fails the
/// handshake and the site reports down rather than a negative expiry.
pub fn client_builder(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .redirect(Policy::none())
        .tls_info(true)
        .timeout(timeout)
}

/// Build the HTTP client shared by all HTTP checkers.
pub fn build_client(timeout: Duration) -> Result<Client> {
    client_builder(timeout).build().map_err(Error::HttpClient)
}

/// Leaf certificate could not be read.
#[derive(Error, Debug)]
pub enum CertificateError {
    /// DER decoding failed
    #[error("failed to parse certificate: {0}")]
    Parse(#[from] x509_parser::nom::Err<X509Error>),

    /// Expiry is too far away to represent
    #[error("certificate expiry out of range")]
    OutOfRange,
}

/// Time between `now` and the `notAfter` of a DER encoded certificate.
///
/// Negative when the certificate has already expired.
pub fn certificate_remaining(
    der: &[u8],
    now: DateTime<Utc>,
) -> std::result::Result<TimeDelta, CertificateError> {
    let (_, cert) = X509Certificate::from_der(der)?;
    let not_after = cert.validity().not_after.timestamp();

    let not_after_ms = not_after
        .checked_mul(1000)
        .ok_or(CertificateError::OutOfRange)?;
    let remaining_ms = not_after_ms
        .checked_sub(now.timestamp_millis())
        .ok_or(CertificateError::OutOfRange)?;

    TimeDelta::try_milliseconds(remaining_ms).ok_or(CertificateError::OutOfRange)
}

/// Checks one HTTP(S) target.
#[derive(Debug, Clone)]
pub struct HttpChecker {
    target: Target,
    client: Client,
}

impl HttpChecker {
    /// Create a checker for `target` using a client from [`build_client`].
    pub fn new(target: Target, client: Client) -> Self {
        Self { target, client }
    }

    fn build_request(&self) -> std::result::Result<Request, CheckError> {
        let method = self.target.request_method();
        let method = Method::from_bytes(method.as_bytes()).map_err(|e| CheckError::InvalidMethod {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

        self.client
            .request(method, self.target.url.as_str())
            .build()
            .map_err(|source| CheckError::InvalidRequest {
                url: self.target.url.clone(),
                source,
            })
    }
}

#[async_trait]
impl Checker for HttpChecker {
    fn target(&self) -> &Target {
        &self.target
    }

    async fn check(&self) -> (CheckOutcome, Option<CheckError>) {
        let mut outcome = CheckOutcome::unreachable(self.target.clone());

        debug!(url = %self.target.url, "checking site");

        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => return (outcome, Some(e)),
        };

        let start = Instant::now();
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %self.target.url, error = %e, "target not reachable");
                return (outcome, None);
            }
        };
        let elapsed = start.elapsed();

        let code = response.status().as_u16();
        let peer_certificate = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(TlsInfo::peer_certificate)
            .map(<[u8]>::to_vec);

        // The body is never read. Dropping the response closes it.
        drop(response);

        info!(url = %self.target.url, code, "host checked");

        outcome.reachable = true;
        outcome.status = Some(code);

        if self.target.accepts(code) {
            outcome.status_accepted = true;
            outcome.latency = Some(elapsed);
        } else {
            warn!(
                url = %self.target.url,
                code,
                "target responded with unexpected HTTP code"
            );
        }

        if let Some(der) = peer_certificate {
            match certificate_remaining(&der, Utc::now()) {
                Ok(remaining) => outcome.certificate_remaining = Some(remaining),
                Err(e) => warn!(url = %self.target.url, error = %e, "unreadable peer certificate"),
            }
        }

        (outcome, None)
    }
}
