//! IPN test cases and the request template they are layered onto.
//!
//! Each [`TestCase`] names the merchant reply it expects and the parameters
//! it changes on the [`base_template`]. The built-in catalog covers the six
//! acknowledgement codes every VNPAY IPN handler must produce:
//!
//! | Id | RspCode | Message | Override |
//! |----|---------|---------|----------|
//! | `success` | 00 | Confirm Success | `vnp_ResponseCode=00`, `vnp_TransactionStatus=00` |
//! | `order-not-found` | 01 | Order not found | `vnp_TxnRef=ORDER_NOT_FOUND` |
//! | `already-processed` | 02 | Order already confirmed | `vnp_TxnRef=ORDER_ALREADY_CONFIRMED` |
//! | `ip-not-allowed` | 03 | Invalid IP | `vnp_TxnRef=ORDER_VALID` |
//! | `invalid-signature` | 97 | Invalid signature | sends `vnp_SecureHash=invalid` in place of the digest |
//! | `system-error` | 99 | Unknown error | `vnp_TxnRef=ORDER_SYSTEM_ERROR` |

use std::fmt::Display;
use std::sync::LazyLock;

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::params::{format_amount, format_timestamp, ParameterSet};

/// One scripted scenario. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub expected_code: String,
    pub expected_message: String,
    pub description: String,
    pub overrides: ParameterSet,
    /// Sent as `vnp_SecureHash` after signing, replacing the computed digest.
    pub secure_hash: Option<String>,
}

impl TestCase {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        expected_code: impl Into<String>,
        expected_message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            expected_code: expected_code.into(),
            expected_message: expected_message.into(),
            description: String::new(),
            overrides: ParameterSet::new(),
            secure_hash: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key, value);
        self
    }

    pub fn with_secure_hash(mut self, digest: impl Into<String>) -> Self {
        self.secure_hash = Some(digest.into());
        self
    }
}

static IPN_CASES: LazyLock<Vec<TestCase>> = LazyLock::new(|| {
    vec![
        TestCase::new("success", "00 - Transaction confirmed", "00", "Confirm Success")
            .with_description("Valid order, not yet processed, correct checksum.")
            .with_override("vnp_ResponseCode", "00")
            .with_override("vnp_TransactionStatus", "00"),
        TestCase::new("order-not-found", "01 - Order not found", "01", "Order not found")
            .with_description("vnp_TxnRef does not exist in the merchant system.")
            .with_override("vnp_TxnRef", "ORDER_NOT_FOUND"),
        TestCase::new(
            "already-processed",
            "02 - Order already confirmed",
            "02",
            "Order already confirmed",
        )
            .with_description("vnp_TxnRef was already processed successfully.")
            .with_override("vnp_TxnRef", "ORDER_ALREADY_CONFIRMED"),
        TestCase::new("ip-not-allowed", "03 - IP not allowed", "03", "Invalid IP")
            .with_description("Caller IP is outside the merchant's whitelist, if any.")
            .with_override("vnp_TxnRef", "ORDER_VALID"),
        TestCase::new("invalid-signature", "97 - Invalid signature", "97", "Invalid signature")
            .with_description("Wrong or missing vnp_SecureHash.")
            .with_secure_hash("invalid"),
        TestCase::new("system-error", "99 - System error", "99", "Unknown error")
            .with_description("Processing failure on the merchant side.")
            .with_override("vnp_TxnRef", "ORDER_SYSTEM_ERROR"),
    ]
});

/// The built-in IPN catalog, in run order.
pub fn ipn_cases() -> &'static [TestCase] {
    &IPN_CASES
}

/// Fresh base parameters. `vnp_CreateDate` is taken from the clock on every call.
pub fn base_template(tmn_code: &str, amount: u64) -> ParameterSet {
    base_template_at(tmn_code, amount, &Local::now())
}

/// Base parameters created at `now`.
pub fn base_template_at<Tz>(tmn_code: &str, amount: u64, now: &DateTime<Tz>) -> ParameterSet
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut params = ParameterSet::new();
    params.insert("vnp_TmnCode", tmn_code);
    params.insert("vnp_Amount", format_amount(amount));
    params.insert("vnp_Command", "pay");
    params.insert("vnp_CreateDate", format_timestamp(now));
    params.insert("vnp_CurrCode", "VND");
    params.insert("vnp_TxnRef", "ORDER123");
    params.insert("vnp_OrderInfo", "IPN test");
    params.insert("vnp_TransactionNo", "123456");
    params.insert("vnp_ResponseCode", "00");
    params.insert("vnp_TransactionStatus", "00");
    params
}
