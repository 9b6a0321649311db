//! reqwest-backed transport to the live directory API.
//!
//! Each request is classified into an [`ApiLane`], waits for a token from that
//! lane's [`LeakyBucket`], and is stamped with the authorization header and the
//! lane's content type. Requests in the versioned lane get the configured
//! `version` query parameter unless the path already carries one.
//!
//! Idempotent requests are retried on connection failures, `429` and `5xx`
//! (except `501`) according to the [`RetryPolicy`]. Every retry takes a fresh
//! rate-limit token.

use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use std::fmt;

use super::{ApiLane, ApiResponse, DirectoryTransport, LeakyBucket, RetryPolicy};
use crate::config::ApiConfig;
use crate::error::{ConfigError, TransportError};

/// Live transport with per-lane pacing and bounded retries.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    authorization: String,
    api_version: String,
    retry: RetryPolicy,
    rest_bucket: LeakyBucket,
    v1_bucket: LeakyBucket,
}

impl HttpTransport {
    /// Build a transport from the API configuration.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::InvalidBaseUrl`] if the base URL does not parse
    /// * [`ConfigError::HttpClient`] if the underlying client cannot be built
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.skip_verify_tls)
            .build()
            .map_err(ConfigError::HttpClient)?;

        if config.skip_verify_tls {
            warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: config.authorization_header(),
            api_version: config.api_version.clone(),
            retry: RetryPolicy::new(config.max_retries),
            rest_bucket: LeakyBucket::per_minute(config.rest_requests_per_minute),
            v1_bucket: LeakyBucket::per_minute(config.v1_requests_per_minute),
        })
    }

    /// Replace the retry policy, e.g. to remove backoff delays.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn bucket(&self, lane: ApiLane) -> &LeakyBucket {
        match lane {
            ApiLane::Rest => &self.rest_bucket,
            ApiLane::V1 => &self.v1_bucket,
        }
    }

    /// Absolute URL for `path`, with the version parameter when the lane needs it.
    pub fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path)).map_err(|e| {
            TransportError::InvalidUrl {
                path: path.to_string(),
                message: e.to_string(),
            }
        })?;

        if ApiLane::classify(path).is_versioned()
            && !url.query_pairs().any(|(key, _)| key == "version")
        {
            url.query_pairs_mut()
                .append_pair("version", &self.api_version);
        }
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<ApiResponse, TransportError> {
        let lane = ApiLane::classify(path);
        let url = self.resolve(path)?;
        let mut attempt = 0;

        loop {
            self.bucket(lane).take().await;

            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, &self.authorization)
                .header(CONTENT_TYPE, lane.content_type());
            if let Some(bytes) = &body {
                request = request.body(bytes.clone());
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(source) => {
                    if self.retry.allows(&method, attempt) {
                        warn!("{} {} failed ({}), retrying", method, url, source);
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(TransportError::Network {
                        method: method.to_string(),
                        path: path.to_string(),
                        source,
                    });
                }
            };

            let status = response.status().as_u16();
            debug!("{} response: {}: {}", status, method, url);

            if RetryPolicy::is_retryable_status(status) && self.retry.allows(&method, attempt) {
                // Drain so the connection can be reused.
                let _ = response.bytes().await;
                warn!("{} {} returned {}, retrying", method, url, status);
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
                attempt += 1;
                continue;
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|source| TransportError::Network {
                    method: method.to_string(),
                    path: path.to_string(),
                    source,
                })?;

            if status >= 400 {
                debug!("response body: {}", String::from_utf8_lossy(&bytes));
                return Err(TransportError::Remote {
                    status,
                    method: method.to_string(),
                    path: path.to_string(),
                });
            }

            return Ok(ApiResponse::new(status, bytes.to_vec()));
        }
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("retry", &self.retry)
            .field("rest_interval", &self.rest_bucket.interval())
            .field("v1_interval", &self.v1_bucket.interval())
            .finish_non_exhaustive()
    }
}

impl DirectoryTransport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<ApiResponse, TransportError> {
        self.execute(method, path, body).await
    }
}
