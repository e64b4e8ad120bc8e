//! Checkers
//!
//! A checker probes one target and reports what it observed. Checkers know
//! nothing about other targets or about how many probes run at once; the
//! [`crate::collector`] owns that.
//!
//! # Outcome vs. error
//!
//! A probe always yields a [`CheckOutcome`] for its target. Next to it, it may
//! return a [`CheckError`]:
//!
//! - **Unreachable targets** (DNS failure, connection refused, timeout) are
//!   a normal observation: `reachable == false`, no error.
//! - **Unexpected status codes** are a normal observation as well:
//!   `reachable == true`, `status_accepted == false`, no error.
//! - **Requests that cannot be built** (invalid method token, unparsable URL)
//!   return a [`CheckError`]. Someone has to fix the configuration; retrying
//!   will not help.

mod http;

use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::{
    build_client, certificate_remaining, client_builder, CertificateError, HttpChecker,
    DEFAULT_TIMEOUT,
};

/// Method used when a target does not specify one
pub const DEFAULT_METHOD: &str = "GET";

/// Status code accepted when a target does not specify any
pub const DEFAULT_CODE: u16 = 200;

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

fn default_codes() -> Vec<u16> {
    vec![DEFAULT_CODE]
}

// =============================================================================
// Target
// =============================================================================

/// An endpoint to check.
///
/// Created once when the configuration is loaded and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Human readable label. Conventionally unique, not enforced.
    pub name: String,

    /// URL to request
    pub url: String,

    /// HTTP method (default: GET)
    #[serde(default = "default_method")]
    pub method: String,

    /// Status codes that count as "up" (default: [200])
    #[serde(default = "default_codes")]
    pub codes: Vec<u16>,
}

impl Target {
    /// Create a target using the default method and accepted codes
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: default_method(),
            codes: default_codes(),
        }
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the accepted status codes
    pub fn with_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.codes = codes.into_iter().collect();
        self
    }

    /// Fill in defaults for an empty method or an empty code list.
    pub fn normalized(mut self) -> Self {
        if self.method.trim().is_empty() {
            self.method = default_method();
        }
        if self.codes.is_empty() {
            self.codes = default_codes();
        }
        self
    }

    /// Method to send, falling back to GET when unset
    pub fn request_method(&self) -> &str {
        if self.method.is_empty() {
            DEFAULT_METHOD
        } else {
            &self.method
        }
    }

    /// Whether `code` is one of the accepted status codes
    pub fn accepts(&self, code: u16) -> bool {
        if self.codes.is_empty() {
            return code == DEFAULT_CODE;
        }
        self.codes.contains(&code)
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What a single probe observed.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Target that was checked
    pub target: Target,

    /// A response was received
    pub reachable: bool,

    /// Status code of the response, if any
    pub status: Option<u16>,

    /// Response status is in the target's accepted set
    pub status_accepted: bool,

    /// Time from dispatch to response headers. Only set when the status was accepted.
    pub latency: Option<Duration>,

    /// Time until the leaf certificate expires. Negative once it has expired.
    /// Only set when the response came over TLS with a peer certificate.
    pub certificate_remaining: Option<TimeDelta>,
}

impl CheckOutcome {
    /// Outcome of a probe that got no response
    pub fn unreachable(target: Target) -> Self {
        Self {
            target,
            reachable: false,
            status: None,
            status_accepted: false,
            latency: None,
            certificate_remaining: None,
        }
    }

    /// Reachable and answered with an accepted status
    pub fn up(&self) -> bool {
        self.reachable && self.status_accepted
    }

    /// The response came over TLS and presented a certificate
    pub fn is_secure_transport(&self) -> bool {
        self.certificate_remaining.is_some()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// A request for a target could not be constructed.
#[derive(Error, Debug)]
pub enum CheckError {
    /// Method is not a valid HTTP token
    #[error("invalid method {method:?}: {reason}")]
    InvalidMethod { method: String, reason: String },

    /// Request could not be built, typically an unparsable URL
    #[error("invalid request for {url}: {source}")]
    InvalidRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The probe itself failed unexpectedly
    #[error("check aborted: {0}")]
    Aborted(String),
}

// =============================================================================
// Checker
// =============================================================================

/// Determines the state of one target.
///
/// Implement this trait for new protocol families. The collector only ever
/// talks to `dyn Checker`.
#[async_trait]
pub trait Checker: Send + Sync + 'static {
    /// Target this checker probes
    fn target(&self) -> &Target;

    /// Probe the target once.
    ///
    /// Always returns an outcome for [`Checker::target`]. The error is only
    /// set when the request could not be built; an unreachable target is not
    /// an error.
    async fn check(&self) -> (CheckOutcome, Option<CheckError>);
}
