//! Error types for vnpcore.
//!
//! This module provides structured error types with:
//! - Stable error codes for programmatic handling
//! - A retry classification for dispatch failures
//! - Human-readable error messages that never carry key material
//!
//! ## Error Codes
//!
//! | Code | Meaning | Retryable |
//! |------|---------|-----------|
//! | `VNP_MALFORMED_INPUT` | URL, query string or encoded value cannot be parsed | no |
//! | `VNP_VALIDATION_ERROR` | Input is well-formed but not acceptable | no |
//! | `VNP_CRYPTO_FAILURE` | Key material rejected by the MAC | no |
//! | `VNP_DISPATCH_FAILED` | Network round trip to the endpoint failed | yes |
//! | `VNP_DISPATCH_TIMEOUT` | Endpoint did not answer within the timeout | yes |
//! | `VNP_CANCELLED` | Caller cancelled the run | no |
//! | `VNP_CONFIG_ERROR` | Harness or alias configuration is invalid | no |
//!
//! A missing secret key and an unrecognized response body are **not** errors:
//! they surface as `SignatureOutcome::NotAttempted` and `ResponseFormat::Unknown`.
//!
//! ## Example
//!
//! ```rust
//! use vnpcore::{VnpError, VnpErrorCode};
//!
//! fn load() -> Result<(), VnpError> {
//!     Err(VnpError::new(VnpErrorCode::MalformedInput, "Invalid percent encoding"))
//! }
//!
//! let err = load().unwrap_err();
//! assert_eq!(err.code(), VnpErrorCode::MalformedInput);
//! assert_eq!(err.to_string(), "VNP_MALFORMED_INPUT: Invalid percent encoding");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Error codes for vnpcore.
///
/// These codes are stable and serialize with the `VNP_` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VnpErrorCode {
    /// URL, query string or percent-encoded value cannot be parsed
    MalformedInput,
    /// Input parsed but violates a rule (empty endpoint, bad method, ...)
    ValidationError,
    /// Key material rejected by the keyed hash
    CryptoFailure,
    /// The HTTP round trip failed (connect, TLS, body read)
    DispatchFailed,
    /// The HTTP round trip exceeded the configured timeout
    DispatchTimeout,
    /// The caller cancelled the run
    Cancelled,
    /// Harness or alias-table configuration is invalid
    ConfigError,
}

const ALL_CODES: [&str; 7] = [
    "VNP_MALFORMED_INPUT",
    "VNP_VALIDATION_ERROR",
    "VNP_CRYPTO_FAILURE",
    "VNP_DISPATCH_FAILED",
    "VNP_DISPATCH_TIMEOUT",
    "VNP_CANCELLED",
    "VNP_CONFIG_ERROR",
];

impl Serialize for VnpErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VnpErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "VNP_MALFORMED_INPUT" => Ok(VnpErrorCode::MalformedInput),
            "VNP_VALIDATION_ERROR" => Ok(VnpErrorCode::ValidationError),
            "VNP_CRYPTO_FAILURE" => Ok(VnpErrorCode::CryptoFailure),
            "VNP_DISPATCH_FAILED" => Ok(VnpErrorCode::DispatchFailed),
            "VNP_DISPATCH_TIMEOUT" => Ok(VnpErrorCode::DispatchTimeout),
            "VNP_CANCELLED" => Ok(VnpErrorCode::Cancelled),
            "VNP_CONFIG_ERROR" => Ok(VnpErrorCode::ConfigError),
            _ => Err(serde::de::Error::unknown_variant(&s, &ALL_CODES)),
        }
    }
}

impl VnpErrorCode {
    /// Whether a retry with the same inputs could succeed.
    ///
    /// Only the network-bound codes are transient. Everything else is a
    /// property of the inputs and will fail the same way again.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            VnpErrorCode::DispatchFailed | VnpErrorCode::DispatchTimeout
        )
    }

    /// Get the error code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VnpErrorCode::MalformedInput => "VNP_MALFORMED_INPUT",
            VnpErrorCode::ValidationError => "VNP_VALIDATION_ERROR",
            VnpErrorCode::CryptoFailure => "VNP_CRYPTO_FAILURE",
            VnpErrorCode::DispatchFailed => "VNP_DISPATCH_FAILED",
            VnpErrorCode::DispatchTimeout => "VNP_DISPATCH_TIMEOUT",
            VnpErrorCode::Cancelled => "VNP_CANCELLED",
            VnpErrorCode::ConfigError => "VNP_CONFIG_ERROR",
        }
    }
}

impl fmt::Display for VnpErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Internal diagnostic reason for errors.
///
/// Adds precision for logs without changing the public code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalReason {
    /// `%` not followed by two hex digits
    PercentEncoding,
    /// Percent-decoded bytes are not UTF-8
    InvalidUtf8,
    /// URL could not be parsed or is not absolute
    UrlParse,
    /// Environment variable present but unparseable
    EnvParse,
    /// Alias pattern failed to compile
    AliasPattern,
    /// Connection, TLS or body read failure
    Transport,
    /// General/unspecified reason
    General,
}

impl fmt::Display for InternalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalReason::PercentEncoding => write!(f, "PERCENT_ENCODING"),
            InternalReason::InvalidUtf8 => write!(f, "INVALID_UTF8"),
            InternalReason::UrlParse => write!(f, "URL_PARSE"),
            InternalReason::EnvParse => write!(f, "ENV_PARSE"),
            InternalReason::AliasPattern => write!(f, "ALIAS_PATTERN"),
            InternalReason::Transport => write!(f, "TRANSPORT"),
            InternalReason::General => write!(f, "GENERAL"),
        }
    }
}

/// Main error type for vnpcore operations.
///
/// Messages are safe for logging: they never contain secret keys.
#[derive(Debug, Clone)]
pub struct VnpError {
    code: VnpErrorCode,
    message: String,
    reason: InternalReason,
    details: Option<BTreeMap<&'static str, String>>,
}

impl VnpError {
    /// Create a new error with the `General` reason.
    pub fn new(code: VnpErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reason: InternalReason::General,
            details: None,
        }
    }

    /// Create a new error with a specific internal reason.
    pub fn with_reason(
        code: VnpErrorCode,
        reason: InternalReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            reason,
            details: None,
        }
    }

    /// Add a diagnostic detail (builder pattern). Must not contain secrets.
    pub fn with_detail(mut self, key: &'static str, value: impl Into<String>) -> Self {
        let map = self.details.get_or_insert_with(BTreeMap::new);
        map.insert(key, value.into());
        self
    }

    pub fn code(&self) -> VnpErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn reason(&self) -> InternalReason {
        self.reason
    }

    pub fn details(&self) -> Option<&BTreeMap<&'static str, String>> {
        self.details.as_ref()
    }

    /// Delegates to `VnpErrorCode::retryable()`.
    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }
}

impl fmt::Display for VnpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for VnpError {}

/// Convenience constructors for common errors.
impl VnpError {
    pub fn malformed(reason: InternalReason, message: impl Into<String>) -> Self {
        Self::with_reason(VnpErrorCode::MalformedInput, reason, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(VnpErrorCode::ValidationError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(VnpErrorCode::ConfigError, message)
    }

    /// Fixed message so nothing about the key leaks into logs.
    pub fn crypto_failure() -> Self {
        Self::new(VnpErrorCode::CryptoFailure, "Secret key rejected by HMAC-SHA512")
    }

    pub fn cancelled() -> Self {
        Self::new(VnpErrorCode::Cancelled, "Run cancelled by caller")
    }
}
