//! Configuration values for the directory API and for reconciliation runs.
//!
//! Nothing here is process-global: an [`ApiConfig`] builds the transport, and a
//! [`ReconcileConfig`] is passed by reference through the matching policy and
//! the reconciliation engine.
//!
//! # Environment
//!
//! | Variable          | Default               | Meaning                          |
//! |-------------------|-----------------------|----------------------------------|
//! | `SSO_API_URL`     | `https://api.snyk.io` | Base URL of the directory API    |
//! | `SSO_API_TOKEN`   | required              | Static API token                 |
//! | `SSO_API_VERSION` | `2024-10-15`          | Version for `/rest` requests     |
//! | `SKIP_VERIFY_TLS` | `false`               | Accept invalid TLS certificates  |

use crate::error::ConfigError;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.snyk.io";
pub const DEFAULT_API_VERSION: &str = "2024-10-15";

/// Connection timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Automatic retries for idempotent requests.
pub const MAX_RETRIES: u32 = 3;

/// Budget of the `/rest` API generation.
pub const RATE_LIMIT_REST_PER_MINUTE: u32 = 1620;

/// Budget of the legacy v1 API generation.
pub const RATE_LIMIT_V1_PER_MINUTE: u32 = 2000;

pub const ENV_BASE_URL: &str = "SSO_API_URL";
pub const ENV_TOKEN: &str = "SSO_API_TOKEN";
pub const ENV_API_VERSION: &str = "SSO_API_VERSION";
pub const ENV_SKIP_VERIFY_TLS: &str = "SKIP_VERIFY_TLS";

/// Settings for talking to the remote directory.
#[derive(Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    pub api_version: String,
    pub skip_verify_tls: bool,
    pub timeout: Duration,
    pub max_retries: u32,
    pub rest_requests_per_minute: u32,
    pub v1_requests_per_minute: u32,
}

impl ApiConfig {
    /// Create a configuration with default limits for the given endpoint and token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            skip_verify_tls: false,
            timeout: REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            rest_requests_per_minute: RATE_LIMIT_REST_PER_MINUTE,
            v1_requests_per_minute: RATE_LIMIT_V1_PER_MINUTE,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset, so defaults still apply.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let token = get(ENV_TOKEN).ok_or(ConfigError::MissingEnv(ENV_TOKEN))?;
        let base_url = get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(base_url, token);
        if let Some(version) = get(ENV_API_VERSION) {
            config.api_version = version;
        }
        if let Some(raw) = get(ENV_SKIP_VERIFY_TLS) {
            config.skip_verify_tls = parse_bool(ENV_SKIP_VERIFY_TLS, &raw)?;
        }
        Ok(config)
    }

    /// Value of the `Authorization` header stamped on every request.
    pub fn authorization_header(&self) -> String {
        format!("token {}", self.token)
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_rate_limits(mut self, rest_per_minute: u32, v1_per_minute: u32) -> Self {
        self.rest_requests_per_minute = rest_per_minute;
        self.v1_requests_per_minute = v1_per_minute;
        self
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("skip_verify_tls", &self.skip_verify_tls)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("rest_requests_per_minute", &self.rest_requests_per_minute)
            .field("v1_requests_per_minute", &self.v1_requests_per_minute)
            .finish()
    }
}

/// Accepts `1`, `t`, `true` and `0`, `f`, `false` in any of the usual casings.
fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: raw.to_string(),
        }),
    }
}

/// The two switches that parameterize identity matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchingPolicy {
    /// Decide source-domain membership from the username instead of the email.
    pub match_by_username: bool,
    /// Find the provisioned counterpart by username equal to the local part,
    /// instead of by email equal to `local_part@sso_domain`.
    pub match_to_local_part: bool,
}

impl MatchingPolicy {
    pub fn new(match_by_username: bool, match_to_local_part: bool) -> Self {
        Self {
            match_by_username,
            match_to_local_part,
        }
    }
}

/// Everything a reconciliation run needs to know besides the tenant id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Pre-migration domain, e.g. `example.com`.
    pub source_domain: String,
    /// Single-sign-on domain the counterparts were provisioned under.
    pub sso_domain: String,
    pub policy: MatchingPolicy,
}

impl ReconcileConfig {
    pub fn new(
        source_domain: impl Into<String>,
        sso_domain: impl Into<String>,
        policy: MatchingPolicy,
    ) -> Self {
        Self {
            source_domain: source_domain.into(),
            sso_domain: sso_domain.into(),
            policy,
        }
    }
}
