//! Hash data for the `querydr` and `refund` merchant APIs.
//!
//! Unlike payment URLs, these APIs do not sign a sorted query string. The
//! signed text is a fixed sequence of field values joined with `|`, in an
//! order specific to each API:
//!
//! ```text
//! querydr: RequestId|Version|Command|TmnCode|TxnRef|TransactionDate|CreateDate|IpAddr|OrderInfo
//! refund:  RequestId|Version|Command|TmnCode|TransactionType|TxnRef|Amount|TransactionNo|
//!          TransactionDate|CreateBy|CreateDate|IpAddr|OrderInfo
//! ```
//!
//! Field values are used raw (no percent-encoding). A missing field
//! contributes an empty segment. `vnp_Command` always equals the API name.

use serde::Serialize;

use crate::errors::VnpError;
use crate::params::ParameterSet;
use crate::sign::{vnp_sign, SecretKey};

const SEPARATOR: &str = "|";

const QUERYDR_FIELDS: &[&str] = &[
    "vnp_RequestId",
    "vnp_Version",
    "vnp_Command",
    "vnp_TmnCode",
    "vnp_TxnRef",
    "vnp_TransactionDate",
    "vnp_CreateDate",
    "vnp_IpAddr",
    "vnp_OrderInfo",
];

const REFUND_FIELDS: &[&str] = &[
    "vnp_RequestId",
    "vnp_Version",
    "vnp_Command",
    "vnp_TmnCode",
    "vnp_TransactionType",
    "vnp_TxnRef",
    "vnp_Amount",
    "vnp_TransactionNo",
    "vnp_TransactionDate",
    "vnp_CreateBy",
    "vnp_CreateDate",
    "vnp_IpAddr",
    "vnp_OrderInfo",
];

/// Which merchant API the hash data is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    QueryDr,
    Refund,
}

impl ApiKind {
    /// The `vnp_Command` value.
    pub fn command(&self) -> &'static str {
        match self {
            ApiKind::QueryDr => "querydr",
            ApiKind::Refund => "refund",
        }
    }

    /// Field names in signing order.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            ApiKind::QueryDr => QUERYDR_FIELDS,
            ApiKind::Refund => REFUND_FIELDS,
        }
    }
}

/// Build the `|`-joined hash data for `kind` from `values`.
///
/// ```rust
/// use vnpcore::{vnp_build_hash_data, ApiKind, ParameterSet};
///
/// let values = ParameterSet::from([
///     ("vnp_RequestId", "r1"),
///     ("vnp_Version", "2.1.0"),
///     ("vnp_Command", "refund"),
/// ]);
/// assert_eq!(vnp_build_hash_data(ApiKind::QueryDr, &values), "r1|2.1.0|querydr||||||");
/// ```
pub fn vnp_build_hash_data(kind: ApiKind, values: &ParameterSet) -> String {
    kind.fields()
        .iter()
        .map(|field| match *field {
            "vnp_Command" => kind.command(),
            other => values.get(other).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// HMAC-SHA512 over [`vnp_build_hash_data`]; becomes `vnp_SecureHash`.
pub fn vnp_sign_hash_data(
    kind: ApiKind,
    values: &ParameterSet,
    key: &SecretKey,
) -> Result<String, VnpError> {
    vnp_sign(&vnp_build_hash_data(kind, values), key)
}

/// Outcome of comparing hand-built hash data against the expected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HashDataCheck {
    /// Nothing to check. A warning, not a failure.
    Empty,
    Valid,
    FieldCountMismatch { expected: usize, actual: usize },
    /// First field whose value differs.
    FieldMismatch { field: String },
}

impl HashDataCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, HashDataCheck::Valid)
    }
}

/// Compare `input` (trimmed) against the hash data built from `values`.
pub fn vnp_check_hash_data(kind: ApiKind, values: &ParameterSet, input: &str) -> HashDataCheck {
    let input = input.trim();
    if input.is_empty() {
        return HashDataCheck::Empty;
    }

    let expected = vnp_build_hash_data(kind, values);
    if input == expected {
        return HashDataCheck::Valid;
    }

    let actual: Vec<&str> = input.split(SEPARATOR).collect();
    let wanted: Vec<&str> = expected.split(SEPARATOR).collect();
    if actual.len() != wanted.len() {
        return HashDataCheck::FieldCountMismatch {
            expected: wanted.len(),
            actual: actual.len(),
        };
    }

    let index = actual
        .iter()
        .zip(&wanted)
        .position(|(a, w)| a != w)
        .unwrap_or_default();
    let field = kind
        .fields()
        .get(index)
        .map(|f| f.to_string())
        .unwrap_or_else(|| format!("field {}", index + 1));
    HashDataCheck::FieldMismatch { field }
}

/// Troubleshooting hints for an API response code.
///
/// ```rust
/// use vnpcore::{vnp_response_hints, ApiKind};
///
/// assert_eq!(vnp_response_hints(ApiKind::QueryDr, "97").len(), 2);
/// assert!(vnp_response_hints(ApiKind::QueryDr, "95").is_empty());
/// assert_eq!(vnp_response_hints(ApiKind::Refund, "95").len(), 1);
/// ```
pub fn vnp_response_hints(kind: ApiKind, code: &str) -> Vec<&'static str> {
    let mut hints: Vec<&'static str> = match code {
        "02" => vec!["Check vnp_TmnCode (sandbox and production codes differ)."],
        "03" => vec!["Check the request data format (types, lengths, required fields)."],
        "91" => vec!["Check that vnp_TxnRef or vnp_TransactionNo exists."],
        "94" => vec!["Duplicate request within the restricted window. Wait and retry."],
        "97" => vec![
            "Check the secret key and the signed string.",
            "Make sure fields are in the documented order and follow the signing rules.",
        ],
        "99" => vec!["Log the full request/response and contact VNPAY if needed."],
        _ => Vec::new(),
    };
    if kind == ApiKind::Refund && code == "95" {
        hints.push(
            "The transaction failed at VNPAY. Check the status of the original transaction.",
        );
    }
    hints
}
