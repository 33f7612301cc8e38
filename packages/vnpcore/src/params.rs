//! Parameter sets and the value conventions shared by every tool.
//!
//! A [`ParameterSet`] maps case-sensitive parameter names to values. Keys are
//! unique; inserting an existing key replaces its value. Iteration is always in
//! byte-wise key order, so two sets holding the same pairs are indistinguishable
//! no matter how they were built.
//!
//! ## Reserved Keys
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `vnp_SecureHash` | The digest itself |
//! | `vnp_SecureHashType` | The digest algorithm label |
//!
//! Both describe the signature and are never part of the signed content.
//!
//! ## Parsing
//!
//! | Function | `+` | Bad `%XX` | Use |
//! |----------|-----|-----------|-----|
//! | [`ParameterSet::from_query_lossy`] | space | kept literally | response bodies, overrides |
//! | [`ParameterSet::from_query_strict`] | space | `VNP_MALFORMED_INPUT` | user-supplied URLs |
//! | [`ParameterSet::from_url`] | space | `VNP_MALFORMED_INPUT` | payment / return URLs |
//!
//! ## Example
//!
//! ```rust
//! use vnpcore::ParameterSet;
//!
//! let params = ParameterSet::from_url(
//!     "https://sandbox.example/pay?vnp_TxnRef=5&vnp_Amount=1000000&vnp_SecureHash=ab",
//! ).unwrap();
//! assert_eq!(params.get("vnp_Amount"), Some("1000000"));
//! assert_eq!(params.signable().len(), 2);
//! ```

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::canonicalize::vnp_percent_decode;
use crate::errors::VnpError;

/// Key carrying the digest.
pub const SECURE_HASH_KEY: &str = "vnp_SecureHash";

/// Key carrying the digest algorithm label.
pub const SECURE_HASH_TYPE_KEY: &str = "vnp_SecureHashType";

/// The order-description field, the only one whose spaces are signed as `+`.
pub const ORDER_INFO_KEY: &str = "vnp_OrderInfo";

/// Layout of every date/time parameter: `yyyyMMddHHmmss`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Length of a formatted date/time parameter.
pub const TIMESTAMP_LEN: usize = 14;

/// Whether `key` is signature metadata.
pub fn is_reserved_key(key: &str) -> bool {
    key == SECURE_HASH_KEY || key == SECURE_HASH_TYPE_KEY
}

/// Key/value parameters, unique and case-sensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, String>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// First non-empty value among `keys`, in the order given.
    pub fn first_non_empty(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pairs in byte-wise key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Layer `other` on top of `self`; `other` wins on key collisions.
    pub fn merge_from(&mut self, other: &ParameterSet) {
        for (k, v) in other.iter() {
            self.0.insert(k.to_string(), v.to_string());
        }
    }

    /// Copy of the set without the reserved signature keys.
    pub fn signable(&self) -> ParameterSet {
        self.0
            .iter()
            .filter(|(k, _)| !is_reserved_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Parse `&`-joined pairs the way browsers parse form data.
    ///
    /// Surrounding whitespace and one leading `?` are ignored, `+` decodes to a
    /// space, broken percent escapes are kept as literal text, and a repeated
    /// key keeps its last value. Never fails.
    pub fn from_query_lossy(raw: &str) -> ParameterSet {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('?').unwrap_or(trimmed);
        url::form_urlencoded::parse(trimmed.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Parse `&`-joined pairs, rejecting broken percent escapes.
    ///
    /// Same rules as [`ParameterSet::from_query_lossy`], except that an invalid
    /// `%XX` sequence or non-UTF-8 result is a `VNP_MALFORMED_INPUT` error.
    pub fn from_query_strict(raw: &str) -> Result<ParameterSet, VnpError> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('?').unwrap_or(trimmed);

        let mut params = ParameterSet::new();
        for part in trimmed.split('&') {
            if part.is_empty() {
                continue;
            }
            let (key, value) = match part.find('=') {
                Some(pos) => (&part[..pos], &part[pos + 1..]),
                None => (part, ""),
            };
            let key = vnp_percent_decode(&key.replace('+', " "))?;
            let value = vnp_percent_decode(&value.replace('+', " "))?;
            params.insert(key, value);
        }
        Ok(params)
    }

    /// Parse the query component of a URL.
    ///
    /// Everything after the first `?` is the query; without a `?` the whole
    /// text is treated as a bare query string. A `#fragment` is dropped.
    pub fn from_url(url: &str) -> Result<ParameterSet, VnpError> {
        let url = url.trim();
        let query = match url.find('?') {
            Some(pos) => &url[pos + 1..],
            None => url,
        };
        let query = query.split('#').next().unwrap_or(query);
        Self::from_query_strict(query)
    }
}

impl FromIterator<(String, String)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        ParameterSet(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ParameterSet {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Render a major-unit amount in integer minor units (`x 100`).
///
/// ```rust
/// assert_eq!(vnpcore::format_amount(10_000), "1000000");
/// ```
pub fn format_amount(major_units: u64) -> String {
    (u128::from(major_units) * 100).to_string()
}

/// Render a date/time in the 14-character `yyyyMMddHHmmss` layout.
pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// The current local time in the parameter layout. Computed on every call.
pub fn now_timestamp() -> String {
    format_timestamp(&Local::now())
}
