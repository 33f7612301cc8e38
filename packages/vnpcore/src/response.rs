//! Tolerant response decoding.
//!
//! Merchant endpoints and gateway APIs answer in whatever shape their author
//! chose: a JSON object, a form-encoded body, or a line of free text.
//! [`vnp_parse_response`] normalizes all of them into a [`ParsedResponse`],
//! trying each format in a fixed order and stopping at the first that yields
//! a result:
//!
//! | Step | Format | Succeeds when |
//! |------|--------|---------------|
//! | 1 | `empty` | input is blank |
//! | 2 | `json` | input is a JSON object with a non-empty code **or** message alias |
//! | 3 | `querystring` | `&`-joined pairs contain a non-empty code alias |
//! | 4 | `text` | the code **or** message pattern matches |
//! | 5 | `unknown` | always |
//!
//! Which field names count is decided by an [`AliasTable`]. Three presets
//! ship ([`AliasTable::ipn`], [`AliasTable::query_refund`],
//! [`AliasTable::callback`]); other vocabularies are built with
//! [`AliasTable::builder`].
//!
//! Parsing never fails. An unrecognized body is a `ResponseFormat::Unknown`
//! result with the raw text preserved.
//!
//! ## Example
//!
//! ```rust
//! use vnpcore::{vnp_parse_response, AliasTable, ResponseFormat};
//!
//! let body = r#"{"RspCode":"01","Message":"Order not found"}"#;
//! let parsed = vnp_parse_response(body, AliasTable::ipn());
//! assert_eq!(parsed.code, "01");
//! assert_eq!(parsed.message, "Order not found");
//! assert_eq!(parsed.format, ResponseFormat::Json);
//! ```

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{InternalReason, VnpError, VnpErrorCode};
use crate::params::ParameterSet;

/// Capture group every text pattern must define.
const VALUE_GROUP: &str = "value";

/// Which step of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Querystring,
    Text,
    Empty,
    Unknown,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Querystring => "querystring",
            ResponseFormat::Text => "text",
            ResponseFormat::Empty => "empty",
            ResponseFormat::Unknown => "unknown",
        }
    }
}

/// Normalized response. Blank strings mean "not found".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedResponse {
    pub code: String,
    pub message: String,
    /// Only populated by tables with status aliases.
    pub transaction_status: String,
    pub format: ResponseFormat,
    /// The input exactly as received, untrimmed.
    pub raw_text: String,
}

impl ParsedResponse {
    fn blank(raw: &str, format: ResponseFormat) -> Self {
        Self {
            code: String::new(),
            message: String::new(),
            transaction_status: String::new(),
            format,
            raw_text: raw.to_string(),
        }
    }
}

/// Field-name vocabulary for one kind of response.
///
/// Alias lists are checked in order; the first non-empty value wins. The
/// query-string stage may rank the same names differently from the JSON
/// stage. Text patterns are case-insensitive and read their capture group
/// named `value`.
#[derive(Debug, Clone)]
pub struct AliasTable {
    code: Vec<String>,
    message: Vec<String>,
    status: Vec<String>,
    query_code: Vec<String>,
    query_message: Vec<String>,
    code_pattern: Option<Regex>,
    message_pattern: Option<Regex>,
    status_pattern: Option<Regex>,
}

static IPN: LazyLock<AliasTable> = LazyLock::new(|| {
    AliasTable::builder()
        .code_aliases(["RspCode", "rspCode", "RSPCODE"])
        .message_aliases(["Message", "RspMsg", "message"])
        .code_pattern(r"RspCode\s*[:=]\s*(?P<value>[0-9]{2})")
        .message_pattern(r"(RspMsg|Message)\s*[:=]\s*(?P<value>[^\n]+)")
        .build()
        .expect("built-in ipn alias table")
});

static QUERY_REFUND: LazyLock<AliasTable> = LazyLock::new(|| {
    AliasTable::builder()
        .code_aliases(["vnp_ResponseCode", "responseCode", "ResponseCode"])
        .message_aliases(["vnp_Message", "message", "Message"])
        .query_code_aliases(["vnp_ResponseCode", "ResponseCode", "responseCode"])
        .query_message_aliases(["vnp_Message", "Message", "message"])
        .status_aliases(["vnp_TransactionStatus"])
        .code_pattern(r"vnp_ResponseCode\s*[:=]\s*(?P<value>[0-9]{2})")
        .message_pattern(r"(vnp_Message|Message)\s*[:=]\s*(?P<value>[^\n]+)")
        .status_pattern(r"vnp_TransactionStatus\s*[:=]\s*(?P<value>[0-9]{2})")
        .build()
        .expect("built-in query/refund alias table")
});

static CALLBACK: LazyLock<AliasTable> = LazyLock::new(|| {
    AliasTable::builder()
        .code_aliases(["vnp_ResponseCode", "vnp_TransactionStatus"])
        .message_aliases(["vnp_Message"])
        .status_aliases(["vnp_TransactionStatus"])
        .code_pattern(r"vnp_ResponseCode\s*[:=]\s*(?P<value>[0-9]{2})")
        .message_pattern(r"vnp_Message\s*[:=]\s*(?P<value>[^\n]+)")
        .status_pattern(r"vnp_TransactionStatus\s*[:=]\s*(?P<value>[0-9]{2})")
        .build()
        .expect("built-in callback alias table")
});

impl AliasTable {
    pub fn builder() -> AliasTableBuilder {
        AliasTableBuilder::default()
    }

    /// Merchant IPN acknowledgements (`RspCode` / `Message`).
    pub fn ipn() -> &'static AliasTable {
        &IPN
    }

    /// Gateway `querydr` / `refund` API replies (`vnp_ResponseCode` / `vnp_Message`).
    pub fn query_refund() -> &'static AliasTable {
        &QUERY_REFUND
    }

    /// Browser-redirect callbacks; the code falls back to `vnp_TransactionStatus`.
    pub fn callback() -> &'static AliasTable {
        &CALLBACK
    }

    pub fn code_aliases(&self) -> &[String] {
        &self.code
    }

    pub fn message_aliases(&self) -> &[String] {
        &self.message
    }

    pub fn status_aliases(&self) -> &[String] {
        &self.status
    }

    /// Code aliases in query-string priority.
    pub fn query_code_aliases(&self) -> &[String] {
        &self.query_code
    }

    pub fn query_message_aliases(&self) -> &[String] {
        &self.query_message
    }

    /// Resolve `(code, message, status)` from an already-parsed parameter set,
    /// in query-string priority.
    pub fn resolve_params(&self, params: &ParameterSet) -> (String, String, String) {
        let pick = |aliases: &[String]| {
            aliases
                .iter()
                .filter_map(|a| params.get(a))
                .find(|v| !v.is_empty())
                .unwrap_or_default()
                .to_string()
        };
        (pick(&self.query_code), pick(&self.query_message), pick(&self.status))
    }

    fn resolve_json(&self, object: &Map<String, Value>) -> (String, String, String) {
        let pick = |aliases: &[String]| {
            aliases
                .iter()
                .filter_map(|a| object.get(a).and_then(json_scalar))
                .find(|v| !v.is_empty())
                .unwrap_or_default()
        };
        (pick(&self.code), pick(&self.message), pick(&self.status))
    }
}

/// Strings as-is, numbers rendered. Anything else is not a field value.
fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn capture(pattern: Option<&Regex>, text: &str) -> Option<String> {
    pattern
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.name(VALUE_GROUP))
        .map(|m| m.as_str().trim().to_string())
}

/// Builder for custom [`AliasTable`]s.
#[derive(Debug, Default)]
pub struct AliasTableBuilder {
    code: Vec<String>,
    message: Vec<String>,
    status: Vec<String>,
    query_code: Option<Vec<String>>,
    query_message: Option<Vec<String>>,
    code_pattern: Option<String>,
    message_pattern: Option<String>,
    status_pattern: Option<String>,
}

impl AliasTableBuilder {
    pub fn code_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.code = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn message_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn status_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.status = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Code aliases for the query-string stage. Defaults to [`Self::code_aliases`].
    pub fn query_code_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_code = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    /// Message aliases for the query-string stage. Defaults to [`Self::message_aliases`].
    pub fn query_message_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_message = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    pub fn code_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.code_pattern = Some(pattern.into());
        self
    }

    pub fn message_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.message_pattern = Some(pattern.into());
        self
    }

    pub fn status_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.status_pattern = Some(pattern.into());
        self
    }

    /// # Errors
    ///
    /// `VNP_CONFIG_ERROR` when no code alias is given, or a pattern does not
    /// compile or lacks a `value` group.
    pub fn build(self) -> Result<AliasTable, VnpError> {
        let query_code = self.query_code.unwrap_or_else(|| self.code.clone());
        if self.code.iter().all(|a| a.is_empty()) || query_code.iter().all(|a| a.is_empty()) {
            return Err(VnpError::config("Alias table needs at least one code alias"));
        }

        Ok(AliasTable {
            query_message: self.query_message.unwrap_or_else(|| self.message.clone()),
            query_code,
            code: self.code,
            message: self.message,
            status: self.status,
            code_pattern: compile(self.code_pattern)?,
            message_pattern: compile(self.message_pattern)?,
            status_pattern: compile(self.status_pattern)?,
        })
    }
}

fn compile(pattern: Option<String>) -> Result<Option<Regex>, VnpError> {
    let Some(pattern) = pattern else {
        return Ok(None);
    };

    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            VnpError::with_reason(
                VnpErrorCode::ConfigError,
                InternalReason::AliasPattern,
                "Invalid alias pattern",
            )
            .with_detail("pattern", pattern.clone())
            .with_detail("error", e.to_string())
        })?;

    if !re.capture_names().flatten().any(|name| name == VALUE_GROUP) {
        return Err(VnpError::with_reason(
            VnpErrorCode::ConfigError,
            InternalReason::AliasPattern,
            "Alias pattern must define a `value` capture group",
        )
        .with_detail("pattern", pattern));
    }

    Ok(Some(re))
}

/// Decode `raw` through the fallback chain using `aliases`.
pub fn vnp_parse_response(raw: &str, aliases: &AliasTable) -> ParsedResponse {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedResponse::blank(raw, ResponseFormat::Empty);
    }

    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(trimmed) {
        let (code, message, transaction_status) = aliases.resolve_json(&object);
        if !code.is_empty() || !message.is_empty() {
            return ParsedResponse {
                code,
                message,
                transaction_status,
                format: ResponseFormat::Json,
                raw_text: raw.to_string(),
            };
        }
    }

    let pairs = ParameterSet::from_query_lossy(trimmed);
    let (code, message, transaction_status) = aliases.resolve_params(&pairs);
    if !code.is_empty() {
        return ParsedResponse {
            code,
            message,
            transaction_status,
            format: ResponseFormat::Querystring,
            raw_text: raw.to_string(),
        };
    }

    let code = capture(aliases.code_pattern.as_ref(), trimmed);
    let message = capture(aliases.message_pattern.as_ref(), trimmed);
    if code.is_some() || message.is_some() {
        return ParsedResponse {
            code: code.unwrap_or_default(),
            message: message.unwrap_or_default(),
            transaction_status: capture(aliases.status_pattern.as_ref(), trimmed)
                .unwrap_or_default(),
            format: ResponseFormat::Text,
            raw_text: raw.to_string(),
        };
    }

    ParsedResponse::blank(raw, ResponseFormat::Unknown)
}
