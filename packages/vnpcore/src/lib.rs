//! # VNP Core
//!
//! **vnpcore** is the signing, verification and response-decoding engine behind
//! a set of VNPAY integration tools (checksum validator, callback debugger, IPN
//! replay checker, query/refund hash checker, encode/decode utility).
//!
//! ## Safety
//!
//! This crate uses `#![forbid(unsafe_code)]`. The merchant secret is held in a
//! zeroizing newtype, redacted in `Debug`, and never logged or sent anywhere.
//!
//! ## What vnpcore Does
//!
//! - Builds the **canonical string** VNPAY signs: reserved keys dropped, keys
//!   sorted byte-wise, values percent-encoded with `! ' ( ) *` forced, spaces in
//!   `vnp_OrderInfo` written as `+`
//! - Signs it with **HMAC-SHA512** (128 lowercase hex characters)
//! - **Verifies** a supplied `vnp_SecureHash` with a three-way outcome
//! - **Decodes** merchant and gateway replies (JSON, query string, free text)
//! - **Replays** scripted IPN notifications at a merchant endpoint and checks
//!   the acknowledgements
//!
//! ## Quick Start
//!
//! ```rust
//! use vnpcore::{
//!     vnp_canonicalize, vnp_sign, vnp_verify, ParameterSet, SecretKey, SignatureOutcome,
//! };
//!
//! let key = SecretKey::new("SECRETKEY1");
//! let mut params = ParameterSet::from([
//!     ("vnp_TxnRef", "5"),
//!     ("vnp_Command", "pay"),
//!     ("vnp_Amount", "1000000"),
//! ]);
//!
//! let canonical = vnp_canonicalize(&params);
//! assert_eq!(canonical, "vnp_Amount=1000000&vnp_Command=pay&vnp_TxnRef=5");
//!
//! let digest = vnp_sign(&canonical, &key).unwrap();
//! params.insert("vnp_SecureHash", digest);
//!
//! let result = vnp_verify(&params, Some(&key)).unwrap();
//! assert_eq!(result.outcome, SignatureOutcome::Verified);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`params`](crate::params) | Parameter sets, URL parsing, amount and date conventions |
//! | [`canonicalize`](crate::canonicalize) | Canonical string, value encoding, encode/decode utility |
//! | [`sign`](crate::sign) | HMAC-SHA512 signer and the secret key type |
//! | [`compare`](crate::compare) | Case-insensitive constant-time digest comparison |
//! | [`verify`](crate::verify) | Three-way signature verification |
//! | [`response`](crate::response) | Multi-format response parser and alias tables |
//! | [`checksum`](crate::checksum) | Payment URL checksum report |
//! | [`callback`](crate::callback) | Callback report with merchant actions |
//! | [`hashdata`](crate::hashdata) | `querydr` / `refund` pipe-joined hash data |
//! | [`harness`](crate::harness) | IPN simulation harness |
//! | [`errors`](crate::errors) | Error types and codes |
//!
//! ## Security Considerations
//!
//! - **Key handling**: pass keys as [`SecretKey`]; never format them into URLs or logs
//! - **Missing key**: verification reports `NotAttempted`, never a pass or a fail
//! - **Untrusted digests**: comparison is constant-time for equal lengths
//! - **Dispatch**: the harness is the only code that performs network I/O

#![forbid(unsafe_code)]

pub mod callback;
pub mod canonicalize;
pub mod checksum;
pub mod compare;
pub mod errors;
pub mod harness;
pub mod hashdata;
pub mod params;
pub mod response;
pub mod sign;
pub mod verify;

pub use callback::{vnp_inspect_callback, CallbackReport, CodeCatalog, CodeInfo, EmptyCatalog};
pub use canonicalize::{
    vnp_canonicalize, vnp_decode, vnp_encode, vnp_encode_value, vnp_percent_decode, vnp_transcode,
    TranscodeDirection,
};
pub use checksum::{vnp_inspect_payment_url, ChecksumReport, ParameterEntry};
pub use compare::vnp_digest_eq;
pub use errors::{InternalReason, VnpError, VnpErrorCode};
pub use hashdata::{
    vnp_build_hash_data, vnp_check_hash_data, vnp_response_hints, vnp_sign_hash_data, ApiKind,
    HashDataCheck,
};
pub use params::{
    format_amount, format_timestamp, is_reserved_key, now_timestamp, ParameterSet, ORDER_INFO_KEY,
    SECURE_HASH_KEY, SECURE_HASH_TYPE_KEY, TIMESTAMP_FORMAT, TIMESTAMP_LEN,
};
pub use response::{
    vnp_parse_response, AliasTable, AliasTableBuilder, ParsedResponse, ResponseFormat,
};
pub use sign::{vnp_sign, vnp_sign_params, SecretKey, DIGEST_HEX_LEN, SECURE_HASH_TYPE};
pub use verify::{vnp_verify, SignatureOutcome, SignatureResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify_through_url() {
        let key = SecretKey::new("SECRETKEY1");
        let params = ParameterSet::from([
            ("vnp_Amount", "1806000"),
            ("vnp_OrderInfo", "Thanh toan don hang :5"),
            ("vnp_ReturnUrl", "https://domainmerchant.vn/ReturnUrl"),
            ("vnp_TxnRef", "5"),
        ]);
        let digest = vnp_sign_params(&params, &key).unwrap();
        let url = format!(
            "https://sandbox.example/paymentv2/vpcpay.html?{}&vnp_SecureHash={}",
            vnp_canonicalize(&params),
            digest
        );

        let parsed = ParameterSet::from_url(&url).unwrap();
        assert_eq!(parsed.get("vnp_OrderInfo"), Some("Thanh toan don hang :5"));
        assert!(vnp_verify(&parsed, Some(&key)).unwrap().is_verified());
    }

    #[test]
    fn test_canonical_never_contains_reserved_keys() {
        let params = ParameterSet::from([
            ("vnp_SecureHash", "x"),
            ("vnp_SecureHashType", "HmacSHA512"),
            ("vnp_TxnRef", "1"),
        ]);
        let canonical = vnp_canonicalize(&params);
        assert!(!canonical.contains("vnp_SecureHash="));
        assert!(!canonical.contains("vnp_SecureHashType="));
    }
}
