//! Egress path for every call made to the directory API.
//!
//! The [`DirectoryTransport`] trait is the single seam between the typed
//! directory client and the wire. Two implementations are provided:
//!
//! - [`HttpTransport`] - reqwest-based, rate limited per API generation, with
//!   auth and version stamping and retries for idempotent requests
//! - [`InMemoryDirectory`] - a self-contained simulation of the directory API,
//!   used by the test suites
//!
//! # Contract
//!
//! `send(method, path, body)` resolves to an [`ApiResponse`] for any status
//! below 400. Statuses of 400 and above become [`TransportError::Remote`]
//! after the response body has been drained and logged at debug level.
//!
//! ```rust,no_run
//! use reqwest::Method;
//! use sso_membership::transport::{DirectoryTransport, InMemoryDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new();
//! let response = directory
//!     .send(Method::GET, "/rest/groups/g1/sso_connections", None)
//!     .await?;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod in_memory;
pub mod rate_limit;
pub mod retry;

pub use http::HttpTransport;
pub use in_memory::InMemoryDirectory;
pub use rate_limit::LeakyBucket;
pub use retry::RetryPolicy;

use crate::error::TransportError;
use reqwest::Method;
use std::future::Future;

/// Path prefix of the versioned REST API generation.
pub const REST_API_ROOT: &str = "/rest";

pub const REST_CONTENT_TYPE: &str = "application/vnd.api+json";
pub const V1_CONTENT_TYPE: &str = "application/json";

/// Status and fully drained body of a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// `204 No Content` and friends.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Sends requests to the directory API.
///
/// Implementations must be safe to share between tasks, although the
/// reconciliation engine itself only ever issues one request at a time.
pub trait DirectoryTransport: Send + Sync {
    /// Send one request and return the drained response.
    ///
    /// # Errors
    ///
    /// * [`TransportError::Network`] when the exchange failed after retries
    /// * [`TransportError::Remote`] when the status is 400 or above
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

/// Rate-limited lane a request travels through.
///
/// Each API generation has its own request budget and its own conventions
/// for content type and versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiLane {
    /// Versioned JSON:API endpoints under `/rest`.
    Rest,
    /// Legacy unversioned endpoints.
    V1,
}

impl ApiLane {
    pub fn classify(path: &str) -> Self {
        if is_under_rest_root(path) {
            Self::Rest
        } else {
            Self::V1
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Rest => REST_CONTENT_TYPE,
            Self::V1 => V1_CONTENT_TYPE,
        }
    }

    /// Whether requests in this lane carry the mandatory `version` parameter.
    pub fn is_versioned(self) -> bool {
        matches!(self, Self::Rest)
    }
}

/// Whether `path` is `/rest` itself or lies below it.
pub fn is_under_rest_root(path: &str) -> bool {
    path.strip_prefix(REST_API_ROOT)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}

/// Methods that can be repeated without changing the outcome.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}
