//! Return-URL / callback inspection.
//!
//! [`vnp_inspect_callback`] decodes a callback URL, verifies its signature with
//! the shared verifier, explains the response code and transaction status, and
//! lists what the merchant should do next.
//!
//! Code meanings come from a [`CodeCatalog`]. The gateway's error-code and
//! transaction-status tables live outside this crate; [`EmptyCatalog`] knows
//! nothing and yields the "unknown" fallbacks.
//!
//! ## Merchant Actions (in order)
//!
//! 1. Signature: three critical warnings on mismatch, one confirmation when verified
//! 2. Response code: `00` success steps, `24` cancellation steps, otherwise the catalog action
//! 3. The transaction-status action, if a status was present
//! 4. Two audit reminders, always

use serde::Serialize;
use tracing::debug;

use crate::errors::VnpError;
use crate::params::ParameterSet;
use crate::response::AliasTable;
use crate::sign::SecretKey;
use crate::verify::{vnp_verify, SignatureOutcome, SignatureResult};

/// Shown when a field is absent from the callback.
pub const NOT_AVAILABLE: &str = "N/A";

const UNKNOWN_CODE: &str = "Unknown response code";
const UNKNOWN_CODE_ACTION: &str = "Contact VNPAY support for clarification";
const UNKNOWN_STATUS: &str = "Unknown transaction status";
const UNKNOWN_STATUS_ACTION: &str = "Verify transaction status with VNPAY";

const MISMATCH_ACTIONS: [&str; 3] = [
    "CRITICAL: Checksum validation failed - do not trust this response",
    "Verify your secret key is correct",
    "Check for parameter tampering",
];
const VERIFIED_ACTION: &str = "Checksum verified - response is authentic";
const SUCCESS_ACTIONS: [&str; 3] = [
    "Payment successful - update order status to PAID",
    "Send confirmation email/notification to customer",
    "Fulfill the order",
];
const CANCELLED_ACTIONS: [&str; 2] = [
    "Customer cancelled - keep order as PENDING",
    "Allow customer to retry payment",
];
const AUDIT_ACTIONS: [&str; 2] = [
    "Log this callback for audit purposes",
    "If IPN callback, respond with correct format to VNPAY",
];
const PARSE_FAILED_ACTION: &str = "Check the URL format and try again";

/// Meaning of a code and the merchant's next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeInfo {
    pub meaning: String,
    pub action: String,
}

impl CodeInfo {
    pub fn new(meaning: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            meaning: meaning.into(),
            action: action.into(),
        }
    }
}

/// Read-only lookup of gateway codes.
pub trait CodeCatalog {
    /// Meaning of a `vnp_ResponseCode` value.
    fn response_code(&self, code: &str) -> Option<CodeInfo>;

    /// Meaning of a `vnp_TransactionStatus` value.
    fn transaction_status(&self, code: &str) -> Option<CodeInfo>;
}

/// Catalog with no entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl CodeCatalog for EmptyCatalog {
    fn response_code(&self, _code: &str) -> Option<CodeInfo> {
        None
    }

    fn transaction_status(&self, _code: &str) -> Option<CodeInfo> {
        None
    }
}

/// Result of [`vnp_inspect_callback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackReport {
    pub signature: SignatureResult,
    pub response_code: String,
    pub response_meaning: String,
    pub transaction_status: String,
    pub status_meaning: String,
    /// Decoded parameters in key order.
    pub parameters: ParameterSet,
    pub merchant_actions: Vec<String>,
    pub parse_error: Option<String>,
}

impl CallbackReport {
    fn unparseable(err: &VnpError) -> Self {
        Self {
            signature: SignatureResult {
                computed_digest: None,
                supplied_digest: None,
                canonical: None,
                outcome: SignatureOutcome::NotAttempted,
            },
            response_code: "Error".to_string(),
            response_meaning: "Failed to parse callback URL".to_string(),
            transaction_status: "Error".to_string(),
            status_meaning: "Error".to_string(),
            parameters: ParameterSet::new(),
            merchant_actions: vec![PARSE_FAILED_ACTION.to_string()],
            parse_error: Some(err.message().to_string()),
        }
    }
}

/// Inspect a callback URL.
///
/// # Errors
///
/// Only `VNP_CRYPTO_FAILURE`. An unparseable URL yields a report with
/// `parse_error` set.
///
/// # Example
///
/// ```rust
/// use vnpcore::{vnp_inspect_callback, EmptyCatalog, SignatureOutcome};
///
/// let report = vnp_inspect_callback(
///     "https://shop.example/return?vnp_ResponseCode=24&vnp_TransactionStatus=02",
///     None,
///     &EmptyCatalog,
/// ).unwrap();
/// assert_eq!(report.response_code, "24");
/// assert_eq!(report.signature.outcome, SignatureOutcome::NotAttempted);
/// assert_eq!(report.merchant_actions[0], "Customer cancelled - keep order as PENDING");
/// ```
pub fn vnp_inspect_callback(
    url: &str,
    key: Option<&SecretKey>,
    catalog: &dyn CodeCatalog,
) -> Result<CallbackReport, VnpError> {
    let params = match ParameterSet::from_url(url) {
        Ok(params) => params,
        Err(err) => {
            debug!(error = %err, "callback url rejected");
            return Ok(CallbackReport::unparseable(&err));
        }
    };

    let signature = vnp_verify(&params, key)?;

    let (code, _, status) = AliasTable::callback().resolve_params(&params);
    let response_code = if code.is_empty() { NOT_AVAILABLE.to_string() } else { code };

    let code_info = catalog
        .response_code(&response_code)
        .unwrap_or_else(|| CodeInfo::new(UNKNOWN_CODE, UNKNOWN_CODE_ACTION));

    let (transaction_status, status_info) = if status.is_empty() {
        (NOT_AVAILABLE.to_string(), None)
    } else {
        let info = catalog
            .transaction_status(&status)
            .unwrap_or_else(|| CodeInfo::new(UNKNOWN_STATUS, UNKNOWN_STATUS_ACTION));
        (status, Some(info))
    };

    let mut actions: Vec<String> = Vec::new();
    match signature.outcome {
        SignatureOutcome::Mismatched => actions.extend(MISMATCH_ACTIONS.map(String::from)),
        SignatureOutcome::Verified => actions.push(VERIFIED_ACTION.to_string()),
        SignatureOutcome::NotAttempted => {}
    }
    match response_code.as_str() {
        "00" => actions.extend(SUCCESS_ACTIONS.map(String::from)),
        "24" => actions.extend(CANCELLED_ACTIONS.map(String::from)),
        _ => actions.push(code_info.action.clone()),
    }
    if let Some(info) = &status_info {
        if !info.action.is_empty() {
            actions.push(info.action.clone());
        }
    }
    actions.extend(AUDIT_ACTIONS.map(String::from));

    Ok(CallbackReport {
        signature,
        response_code,
        response_meaning: code_info.meaning,
        transaction_status,
        status_meaning: status_info.map_or_else(|| NOT_AVAILABLE.to_string(), |i| i.meaning),
        parameters: params,
        merchant_actions: actions,
        parse_error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::vnp_sign_params;

    struct Fixed;

    impl CodeCatalog for Fixed {
        fn response_code(&self, code: &str) -> Option<CodeInfo> {
            match code {
                "00" => Some(CodeInfo::new("Giao dich thanh cong", "")),
                "11" => Some(CodeInfo::new("Payment window expired", "Ask customer to pay again")),
                _ => None,
            }
        }

        fn transaction_status(&self, code: &str) -> Option<CodeInfo> {
            (code == "00").then(|| CodeInfo::new("Completed", "Reconcile daily"))
        }
    }

    fn signed_url(key: &SecretKey, code: &str) -> String {
        let params = ParameterSet::from([
            ("vnp_ResponseCode", code),
            ("vnp_TransactionStatus", "00"),
            ("vnp_TxnRef", "ORDER1"),
        ]);
        let digest = vnp_sign_params(&params, key).unwrap();
        format!(
            "https://shop.example/return?vnp_ResponseCode={}&vnp_TransactionStatus=00\
             &vnp_TxnRef=ORDER1&vnp_SecureHash={}",
            code, digest
        )
    }

    #[test]
    fn test_verified_success_callback() {
        let key = SecretKey::new("SECRETKEY1");
        let report = vnp_inspect_callback(&signed_url(&key, "00"), Some(&key), &Fixed).unwrap();

        assert_eq!(report.signature.outcome, SignatureOutcome::Verified);
        assert_eq!(report.response_code, "00");
        assert_eq!(report.response_meaning, "Giao dich thanh cong");
        assert_eq!(report.status_meaning, "Completed");
        assert_eq!(
            report.merchant_actions,
            vec![
                VERIFIED_ACTION,
                SUCCESS_ACTIONS[0],
                SUCCESS_ACTIONS[1],
                SUCCESS_ACTIONS[2],
                "Reconcile daily",
                AUDIT_ACTIONS[0],
                AUDIT_ACTIONS[1],
            ]
        );
    }

    #[test]
    fn test_tampered_callback() {
        let key = SecretKey::new("SECRETKEY1");
        let url = signed_url(&key, "00").replace("ORDER1", "ORDER2");
        let report = vnp_inspect_callback(&url, Some(&key), &Fixed).unwrap();

        assert_eq!(report.signature.outcome, SignatureOutcome::Mismatched);
        assert_eq!(&report.merchant_actions[..3], &MISMATCH_ACTIONS.map(String::from)[..]);
    }

    #[test]
    fn test_catalog_action_for_other_codes() {
        let report =
            vnp_inspect_callback("vnp_ResponseCode=11&vnp_TransactionStatus=00", None, &Fixed)
                .unwrap();
        assert_eq!(report.response_meaning, "Payment window expired");
        assert_eq!(report.merchant_actions[0], "Ask customer to pay again");
        assert_eq!(report.merchant_actions[1], "Reconcile daily");
    }

    #[test]
    fn test_unknown_codes_with_empty_catalog() {
        let report = vnp_inspect_callback(
            "vnp_ResponseCode=51&vnp_TransactionStatus=02",
            None,
            &EmptyCatalog,
        )
        .unwrap();
        assert_eq!(report.response_meaning, UNKNOWN_CODE);
        assert_eq!(report.status_meaning, UNKNOWN_STATUS);
        assert_eq!(
            report.merchant_actions,
            vec![UNKNOWN_CODE_ACTION, UNKNOWN_STATUS_ACTION, AUDIT_ACTIONS[0], AUDIT_ACTIONS[1]]
        );
    }

    #[test]
    fn test_code_falls_back_to_status() {
        let report = vnp_inspect_callback("vnp_TransactionStatus=02", None, &EmptyCatalog).unwrap();
        assert_eq!(report.response_code, "02");
        assert_eq!(report.transaction_status, "02");
    }

    #[test]
    fn test_missing_fields_are_na() {
        let report = vnp_inspect_callback("vnp_TxnRef=1", None, &EmptyCatalog).unwrap();
        assert_eq!(report.response_code, NOT_AVAILABLE);
        assert_eq!(report.transaction_status, NOT_AVAILABLE);
        assert_eq!(report.status_meaning, NOT_AVAILABLE);
        assert_eq!(report.merchant_actions.len(), 3);
    }

    #[test]
    fn test_unparseable_callback() {
        let report = vnp_inspect_callback("https://x.test/?a=%zz", None, &EmptyCatalog).unwrap();
        assert_eq!(report.response_code, "Error");
        assert_eq!(report.merchant_actions, vec![PARSE_FAILED_ACTION]);
        assert!(report.parse_error.is_some());
    }
}
