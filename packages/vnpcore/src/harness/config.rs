//! Harness configuration.
//!
//! # Environment Variables
//!
//! - `VNP_HARNESS_ENDPOINT` (required): merchant IPN URL, absolute http(s)
//! - `VNP_HARNESS_METHOD` (optional): `GET` or `POST` (default: `GET`)
//! - `VNP_HARNESS_TMN_CODE` (optional): terminal code (default: `DEMO`)
//! - `VNP_HARNESS_SECRET_KEY` (optional): hash secret; blank means none
//! - `VNP_HARNESS_INCLUDE_SECURE_HASH` (optional): sign requests (default: `true`)
//! - `VNP_HARNESS_OVERRIDES` (optional): extra parameters as a query string
//! - `VNP_HARNESS_TIMEOUT_SECS` (optional): per-request timeout (default: none)
//! - `VNP_HARNESS_AMOUNT` (optional): amount in major units (default: `1000`)
//!
//! ```bash
//! export VNP_HARNESS_ENDPOINT="https://shop.example/vnpay/ipn"
//! export VNP_HARNESS_METHOD="POST"
//! export VNP_HARNESS_OVERRIDES="vnp_Amount=5000000&vnp_BankCode=NCB"
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{InternalReason, VnpError, VnpErrorCode};
use crate::params::ParameterSet;
use crate::sign::SecretKey;

const ENV_PREFIX: &str = "VNP_HARNESS_";

/// Terminal code used when none is configured.
pub const DEFAULT_TMN_CODE: &str = "DEMO";

/// Amount (major units) used in the base template.
pub const DEFAULT_AMOUNT: u64 = 1000;

/// How parameters reach the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Parameters in the URL query.
    #[default]
    Get,
    /// Parameters as an `application/x-www-form-urlencoded` body.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = VnpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            other => Err(VnpError::validation(format!("Unsupported method: {}", other))),
        }
    }
}

/// Settings for a [`Harness`](super::Harness).
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Merchant endpoint receiving the simulated notifications.
    pub endpoint: String,
    pub method: HttpMethod,
    /// `vnp_TmnCode` in the base template. Blank falls back to `DEMO`.
    pub tmn_code: String,
    pub secret_key: Option<SecretKey>,
    /// Attach `vnp_SecureHash` when a key is present.
    pub include_secure_hash: bool,
    /// User overrides as a query string; applied last.
    pub overrides: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// `vnp_Amount` in major units, rendered `x 100`.
    pub amount: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            method: HttpMethod::Get,
            tmn_code: DEFAULT_TMN_CODE.to_string(),
            secret_key: None,
            include_secure_hash: true,
            overrides: String::new(),
            timeout: None,
            amount: DEFAULT_AMOUNT,
        }
    }
}

impl HarnessConfig {
    /// Config for `endpoint` with every other field at its default.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Blank secrets are treated as absent.
    pub fn with_secret_key(mut self, secret: &str) -> Self {
        self.secret_key = SecretKey::non_empty(secret);
        self
    }

    pub fn with_overrides(mut self, overrides: impl Into<String>) -> Self {
        self.overrides = overrides.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load from `VNP_HARNESS_*` variables.
    ///
    /// # Errors
    ///
    /// `VNP_CONFIG_ERROR` if the endpoint is missing or a value does not parse.
    pub fn from_env() -> Result<Self, VnpError> {
        let defaults = Self::default();

        let endpoint = env_var("ENDPOINT").ok_or_else(|| {
            VnpError::config(format!("{}ENDPOINT must be set", ENV_PREFIX))
                .with_detail("key", format!("{}ENDPOINT", ENV_PREFIX))
        })?;

        let method = match env_var("METHOD") {
            Some(raw) => raw.parse::<HttpMethod>().map_err(|e| env_error("METHOD", e.message()))?,
            None => defaults.method,
        };

        let timeout = match env_var("TIMEOUT_SECS") {
            Some(_) => Some(Duration::from_secs(parse_env_var("TIMEOUT_SECS", 0u64)?)),
            None => None,
        };

        Ok(Self {
            endpoint,
            method,
            tmn_code: env_var("TMN_CODE").unwrap_or(defaults.tmn_code),
            secret_key: env_var("SECRET_KEY").and_then(|s| SecretKey::non_empty(&s)),
            include_secure_hash: parse_env_var(
                "INCLUDE_SECURE_HASH",
                defaults.include_secure_hash,
            )?,
            overrides: env_var("OVERRIDES").unwrap_or_default(),
            timeout,
            amount: parse_env_var("AMOUNT", defaults.amount)?,
        })
    }

    /// Check the endpoint and timeout.
    ///
    /// # Errors
    ///
    /// `VNP_CONFIG_ERROR` for an empty, relative or non-http(s) endpoint, or a
    /// zero timeout.
    pub fn validate(&self) -> Result<(), VnpError> {
        self.endpoint_url()?;

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(VnpError::config("timeout must be greater than 0")
                .with_detail("key", format!("{}TIMEOUT_SECS", ENV_PREFIX)));
        }

        Ok(())
    }

    /// The endpoint as a parsed URL.
    pub fn endpoint_url(&self) -> Result<Url, VnpError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(VnpError::config("Please enter IPN URL"));
        }

        let url = Url::parse(endpoint).map_err(|e| {
            VnpError::with_reason(
                VnpErrorCode::ConfigError,
                InternalReason::UrlParse,
                format!("Invalid endpoint URL: {}", e),
            )
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(VnpError::with_reason(
                VnpErrorCode::ConfigError,
                InternalReason::UrlParse,
                format!("Endpoint must use http or https, got {}", url.scheme()),
            ));
        }

        Ok(url)
    }

    /// The effective terminal code.
    pub fn effective_tmn_code(&self) -> &str {
        let code = self.tmn_code.trim();
        if code.is_empty() {
            DEFAULT_TMN_CODE
        } else {
            code
        }
    }

    /// User overrides, parsed form-style. Never fails.
    pub fn override_params(&self) -> ParameterSet {
        ParameterSet::from_query_lossy(&self.overrides)
    }

    /// The key to sign with, or `None` when signing is off or no key is set.
    pub fn signing_key(&self) -> Option<&SecretKey> {
        if self.include_secure_hash {
            self.secret_key.as_ref()
        } else {
            None
        }
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, suffix)).ok()
}

fn env_error(suffix: &str, message: &str) -> VnpError {
    let key = format!("{}{}", ENV_PREFIX, suffix);
    VnpError::with_reason(
        VnpErrorCode::ConfigError,
        InternalReason::EnvParse,
        format!("Failed to parse {}: {}", key, message),
    )
    .with_detail("key", key)
}

fn parse_env_var<T>(suffix: &str, default: T) -> Result<T, VnpError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_var(suffix)
        .map(|v| v.trim().parse::<T>().map_err(|e| env_error(suffix, &e.to_string())))
        .unwrap_or(Ok(default))
}
