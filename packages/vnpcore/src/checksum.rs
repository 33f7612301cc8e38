//! Payment URL checksum inspection.
//!
//! [`vnp_inspect_payment_url`] takes a full payment URL (or a bare query
//! string), recomputes its signature and reports every parameter together
//! with common formatting mistakes:
//!
//! | Parameter | Issue |
//! |-----------|-------|
//! | `vnp_Amount` | contains a decimal point |
//! | `vnp_CreateDate` | not exactly 14 characters |
//!
//! A URL that cannot be parsed is not an error: the report carries
//! `parse_error` and placeholder digests so the caller always has something
//! to display.

use serde::Serialize;
use tracing::debug;

use crate::errors::VnpError;
use crate::params::{ParameterSet, TIMESTAMP_LEN};
use crate::sign::SecretKey;
use crate::verify::{vnp_verify, SignatureOutcome};

const AMOUNT_DECIMALS: &str = "Amount should not have decimals";
const DATE_LAYOUT: &str = "Date format should be yyyyMMddHHmmss (14 chars)";

/// Placeholder shown in place of the supplied digest when parsing failed.
pub const PARSE_ERROR_SUPPLIED: &str = "Error parsing URL";
/// Placeholder shown in place of the computed digest when parsing failed.
pub const PARSE_ERROR_COMPUTED: &str = "Error generating hash";

/// One decoded parameter and what looks wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterEntry {
    pub key: String,
    pub value: String,
    /// Issues joined with `", "`, `None` when the value looks fine.
    pub issue: Option<String>,
}

/// Result of [`vnp_inspect_payment_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumReport {
    pub outcome: SignatureOutcome,
    /// `vnp_SecureHash` from the URL, empty when absent.
    pub supplied_digest: String,
    /// Locally computed digest, empty when no key was given.
    pub computed_digest: String,
    /// The string that was signed.
    pub canonical: String,
    /// Every parameter, sorted by key, reserved ones included.
    pub parameters: Vec<ParameterEntry>,
    pub parse_error: Option<String>,
}

impl ChecksumReport {
    fn unparseable(err: &VnpError) -> Self {
        Self {
            outcome: SignatureOutcome::NotAttempted,
            supplied_digest: PARSE_ERROR_SUPPLIED.to_string(),
            computed_digest: PARSE_ERROR_COMPUTED.to_string(),
            canonical: String::new(),
            parameters: Vec::new(),
            parse_error: Some(err.message().to_string()),
        }
    }

    /// Entries that carry at least one issue.
    pub fn issues(&self) -> impl Iterator<Item = &ParameterEntry> {
        self.parameters.iter().filter(|p| p.issue.is_some())
    }
}

fn parameter_issue(key: &str, value: &str) -> Option<String> {
    let mut issues = Vec::new();
    if key == "vnp_Amount" && value.contains('.') {
        issues.push(AMOUNT_DECIMALS);
    }
    if key == "vnp_CreateDate" && value.chars().count() != TIMESTAMP_LEN {
        issues.push(DATE_LAYOUT);
    }
    if issues.is_empty() {
        None
    } else {
        Some(issues.join(", "))
    }
}

/// Parse `url`, recompute its signature and list its parameters.
///
/// # Errors
///
/// Only `VNP_CRYPTO_FAILURE`. Parse failures are folded into the report.
///
/// # Example
///
/// ```rust
/// use vnpcore::{vnp_inspect_payment_url, SecretKey, SignatureOutcome};
///
/// let report = vnp_inspect_payment_url(
///     "https://sandbox.example/pay?vnp_Amount=10.5&vnp_SecureHash=00",
///     Some(&SecretKey::new("SECRETKEY1")),
/// ).unwrap();
/// assert_eq!(report.outcome, SignatureOutcome::Mismatched);
/// assert_eq!(report.issues().count(), 1);
/// ```
pub fn vnp_inspect_payment_url(
    url: &str,
    key: Option<&SecretKey>,
) -> Result<ChecksumReport, VnpError> {
    let params = match ParameterSet::from_url(url) {
        Ok(params) => params,
        Err(err) => {
            debug!(error = %err, "payment url rejected");
            return Ok(ChecksumReport::unparseable(&err));
        }
    };

    let signature = vnp_verify(&params, key)?;
    let parameters = params
        .iter()
        .map(|(k, v)| ParameterEntry {
            key: k.to_string(),
            value: v.to_string(),
            issue: parameter_issue(k, v),
        })
        .collect();

    Ok(ChecksumReport {
        outcome: signature.outcome,
        supplied_digest: signature.supplied_digest.unwrap_or_default(),
        computed_digest: signature.computed_digest.unwrap_or_default(),
        canonical: signature
            .canonical
            .unwrap_or_else(|| crate::canonicalize::vnp_canonicalize(&params)),
        parameters,
        parse_error: None,
    })
}
