//! IPN simulation harness.
//!
//! Replays scripted IPN notifications at a merchant endpoint and checks that
//! the merchant acknowledges each one with the expected `RspCode` / `Message`.
//!
//! ## Run Steps
//!
//! | Step | What happens |
//! |------|--------------|
//! | Build | base template ← case overrides ← user overrides (user wins) |
//! | Sign | if signing is on and a key is set, attach the computed `vnp_SecureHash`; a case's replacement digest is then sent in its place |
//! | Dispatch | GET query or POST form, raced against cancellation and the optional timeout |
//! | Compare | parse the body, code must equal, message must be contained (case-insensitive) |
//!
//! [`Harness::run_case`] surfaces a dispatch failure as an `Err`.
//! [`Harness::run_all`] runs the catalog strictly in order and records a
//! failing dispatch as that case's `error` result, then moves on.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vnpcore::harness::{CancelSource, Harness, HarnessConfig, HttpMethod};
//!
//! # async fn example() -> Result<(), vnpcore::VnpError> {
//! let config = HarnessConfig::new("https://shop.example/vnpay/ipn")
//!     .with_method(HttpMethod::Post)
//!     .with_secret_key("SECRETKEY1");
//! let harness = Harness::new(config)?;
//!
//! let source = CancelSource::new();
//! let report = harness.run_all(&source.token()).await;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

mod cancel;
mod catalog;
mod config;
mod dispatch;

pub use cancel::{CancelSource, CancelToken};
pub use catalog::{base_template, base_template_at, ipn_cases, TestCase};
pub use config::{HarnessConfig, HttpMethod, DEFAULT_AMOUNT, DEFAULT_TMN_CODE};
pub use dispatch::{url_with_params, DispatchResponse, Dispatcher, HttpDispatcher};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::errors::{InternalReason, VnpError, VnpErrorCode};
use crate::params::{ParameterSet, SECURE_HASH_KEY};
use crate::response::{vnp_parse_response, AliasTable, ParsedResponse, ResponseFormat};
use crate::sign::vnp_sign_params;

/// Verdict for one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Pass,
    Fail,
    Error,
}

/// Expected acknowledgement. Blank fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Expectation {
    pub code: String,
    pub message: String,
}

impl Expectation {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    fn of(case: &TestCase) -> Self {
        Self::new(case.expected_code.clone(), case.expected_message.clone())
    }

    /// Code equal, message contained case-insensitively.
    pub fn is_met_by(&self, parsed: &ParsedResponse) -> bool {
        let code_ok = self.code.is_empty() || parsed.code == self.code;
        let message_ok = self.message.is_empty()
            || parsed
                .message
                .to_lowercase()
                .contains(&self.message.to_lowercase());
        code_ok && message_ok
    }
}

/// Outcome of one simulated notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    pub id: String,
    pub title: String,
    pub expected_code: String,
    pub expected_message: String,
    /// Blank when not found or when the dispatch failed.
    pub actual_code: String,
    pub actual_message: String,
    pub status: CaseStatus,
    pub raw_text: String,
    /// `None` when the dispatch failed.
    pub format: Option<ResponseFormat>,
    pub http_status: Option<u16>,
    /// Dispatch failure message for `error` results.
    pub error: Option<String>,
    /// Parameters as sent, signature included.
    pub sent: ParameterSet,
}

impl CaseResult {
    fn errored(
        case: &TestCase,
        expectation: &Expectation,
        sent: ParameterSet,
        err: &VnpError,
    ) -> Self {
        Self {
            id: case.id.clone(),
            title: case.title.clone(),
            expected_code: expectation.code.clone(),
            expected_message: expectation.message.clone(),
            actual_code: String::new(),
            actual_message: String::new(),
            status: CaseStatus::Error,
            raw_text: String::new(),
            format: None,
            http_status: None,
            error: Some(err.to_string()),
            sent,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Pass
    }
}

/// Results of [`Harness::run_all`], in catalog order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<CaseResult>,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// The run was stopped before every case ran.
    pub cancelled: bool,
}

impl BatchReport {
    fn from_results(results: Vec<CaseResult>, cancelled: bool) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            passed: count(CaseStatus::Pass),
            failed: count(CaseStatus::Fail),
            errored: count(CaseStatus::Error),
            cancelled,
            results,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Every case ran and passed.
    pub fn all_passed(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.errored == 0
    }

    /// Cases that did not pass.
    pub fn failures(&self) -> Vec<&CaseResult> {
        self.results.iter().filter(|r| !r.passed()).collect()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{}/{} passed, {} failed, {} errored",
            self.passed,
            self.total(),
            self.failed,
            self.errored
        );
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        summary
    }
}

/// Drives test cases at one endpoint.
pub struct Harness<D = HttpDispatcher> {
    config: HarnessConfig,
    endpoint: Url,
    dispatcher: D,
    cases: Vec<TestCase>,
    aliases: AliasTable,
    clock: fn() -> DateTime<Local>,
}

impl Harness<HttpDispatcher> {
    /// Harness over HTTP with the built-in IPN catalog.
    ///
    /// # Errors
    ///
    /// `VNP_CONFIG_ERROR` if the config does not validate.
    pub fn new(config: HarnessConfig) -> Result<Self, VnpError> {
        Self::with_dispatcher(config, HttpDispatcher::new())
    }
}

impl<D: Dispatcher> Harness<D> {
    pub fn with_dispatcher(config: HarnessConfig, dispatcher: D) -> Result<Self, VnpError> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;
        Ok(Self {
            config,
            endpoint,
            dispatcher,
            cases: ipn_cases().to_vec(),
            aliases: AliasTable::ipn().clone(),
            clock: Local::now,
        })
    }

    /// Replace the catalog.
    pub fn with_cases(mut self, cases: Vec<TestCase>) -> Self {
        self.cases = cases;
        self
    }

    /// Replace the reply vocabulary (IPN aliases by default).
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Replace the clock `vnp_CreateDate` is read from.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn case(&self, id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// Assemble the parameters for `case`, signed when configured.
    ///
    /// The digest is computed over the merged set and always replaces a
    /// `vnp_SecureHash` coming from the overrides. A case's own
    /// [`TestCase::secure_hash`] is sent last, in place of the digest.
    pub fn build_params(&self, case: &TestCase) -> Result<ParameterSet, VnpError> {
        let now = (self.clock)();
        let mut params =
            base_template_at(self.config.effective_tmn_code(), self.config.amount, &now);
        params.merge_from(&case.overrides);
        params.merge_from(&self.config.override_params());

        if let Some(key) = self.config.signing_key() {
            let digest = vnp_sign_params(&params, key)?;
            params.insert(SECURE_HASH_KEY, digest);
        }
        if let Some(digest) = &case.secure_hash {
            debug!(case = %case.id, "sending replacement vnp_SecureHash");
            params.insert(SECURE_HASH_KEY, digest.clone());
        }
        Ok(params)
    }

    /// Run one case by id.
    ///
    /// `expectation` replaces the case's own expected code and message.
    ///
    /// # Errors
    ///
    /// `VNP_VALIDATION_ERROR` for an unknown id, `VNP_CANCELLED`, or the
    /// dispatch failure.
    #[instrument(skip(self, expectation, cancel), fields(method = %self.config.method))]
    pub async fn run_case(
        &self,
        case_id: &str,
        expectation: Option<&Expectation>,
        cancel: &CancelToken,
    ) -> Result<CaseResult, VnpError> {
        let case = self
            .case(case_id)
            .ok_or_else(|| VnpError::validation(format!("Unknown test case: {}", case_id)))?;
        let expectation = expectation.cloned().unwrap_or_else(|| Expectation::of(case));

        let params = self.build_params(case)?;
        self.execute(case, &expectation, params, cancel).await
    }

    /// Run every case in order, isolating dispatch failures per case.
    #[instrument(
        skip(self, cancel),
        fields(method = %self.config.method, cases = self.cases.len())
    )]
    pub async fn run_all(&self, cancel: &CancelToken) -> BatchReport {
        let mut results = Vec::with_capacity(self.cases.len());
        let mut cancelled = false;

        for case in &self.cases {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let expectation = Expectation::of(case);
            let params = match self.build_params(case) {
                Ok(params) => params,
                Err(err) => {
                    warn!(case = %case.id, error = %err, "could not build request");
                    let sent = ParameterSet::new();
                    results.push(CaseResult::errored(case, &expectation, sent, &err));
                    continue;
                }
            };

            match self.execute(case, &expectation, params.clone(), cancel).await {
                Ok(result) => results.push(result),
                Err(err) if err.code() == VnpErrorCode::Cancelled => {
                    cancelled = true;
                    break;
                }
                Err(err) => {
                    warn!(case = %case.id, error = %err, "dispatch failed");
                    results.push(CaseResult::errored(case, &expectation, params, &err));
                }
            }
        }

        let report = BatchReport::from_results(results, cancelled);
        info!(summary = %report.summary(), "batch finished");
        report
    }

    async fn execute(
        &self,
        case: &TestCase,
        expectation: &Expectation,
        params: ParameterSet,
        cancel: &CancelToken,
    ) -> Result<CaseResult, VnpError> {
        if cancel.is_cancelled() {
            return Err(VnpError::cancelled());
        }

        debug!(case = %case.id, params = params.len(), "dispatching");
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VnpError::cancelled()),
            response = self.send(&params) => response?,
        };

        let parsed = vnp_parse_response(&response.body, &self.aliases);
        let status = if expectation.is_met_by(&parsed) {
            CaseStatus::Pass
        } else {
            CaseStatus::Fail
        };
        info!(
            case = %case.id,
            ?status,
            code = %parsed.code,
            format = parsed.format.as_str(),
            "case finished"
        );

        Ok(CaseResult {
            id: case.id.clone(),
            title: case.title.clone(),
            expected_code: expectation.code.clone(),
            expected_message: expectation.message.clone(),
            actual_code: parsed.code,
            actual_message: parsed.message,
            status,
            raw_text: parsed.raw_text,
            format: Some(parsed.format),
            http_status: Some(response.status),
            error: None,
            sent: params,
        })
    }

    async fn send(&self, params: &ParameterSet) -> Result<DispatchResponse, VnpError> {
        let dispatch = self.dispatcher.dispatch(&self.endpoint, self.config.method, params);
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, dispatch).await.map_err(|_| {
                VnpError::with_reason(
                    VnpErrorCode::DispatchTimeout,
                    InternalReason::Transport,
                    format!("Endpoint did not respond within {} ms", limit.as_millis()),
                )
            })?,
            None => dispatch.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::SecretKey;
    use crate::verify::{vnp_verify, SignatureOutcome};
    use crate::params::TIMESTAMP_LEN;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    /// Answers with a fixed body and remembers what it was sent.
    struct Canned {
        body: String,
        seen: Mutex<Vec<ParameterSet>>,
    }

    impl Canned {
        fn new(body: &str) -> Self {
            Self {
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Dispatcher for Canned {
        async fn dispatch(
            &self,
            _endpoint: &Url,
            _method: HttpMethod,
            params: &ParameterSet,
        ) -> Result<DispatchResponse, VnpError> {
            self.seen.lock().unwrap().push(params.clone());
            Ok(DispatchResponse {
                status: 200,
                body: self.body.clone(),
            })
        }
    }

    fn harness(config: HarnessConfig, body: &str) -> Harness<Canned> {
        Harness::with_dispatcher(config, Canned::new(body)).unwrap()
    }

    fn parsed(code: &str, message: &str) -> ParsedResponse {
        ParsedResponse {
            code: code.to_string(),
            message: message.to_string(),
            transaction_status: String::new(),
            format: ResponseFormat::Json,
            raw_text: String::new(),
        }
    }

    #[test]
    fn test_expectation_message_is_substring() {
        let exp = Expectation::new("00", "Success");
        assert!(exp.is_met_by(&parsed("00", "Payment Success.")));
        assert!(exp.is_met_by(&parsed("00", "CONFIRM SUCCESS")));
        assert!(!exp.is_met_by(&parsed("00", "Failure")));
        assert!(!exp.is_met_by(&parsed("01", "Success")));
    }

    #[test]
    fn test_blank_expectation_matches_anything() {
        assert!(Expectation::default().is_met_by(&parsed("42", "whatever")));
        assert!(Expectation::new("", "ok").is_met_by(&parsed("99", "OK")));
    }

    #[test]
    fn test_build_params_merge_order() {
        let config = HarnessConfig::new("https://shop.example/ipn")
            .with_overrides("vnp_TxnRef=USER&vnp_BankCode=NCB");
        let h = harness(config, "");
        let case = h.case("order-not-found").unwrap().clone();
        let params = h.build_params(&case).unwrap();

        assert_eq!(params.get("vnp_TxnRef"), Some("USER"));
        assert_eq!(params.get("vnp_BankCode"), Some("NCB"));
        assert_eq!(params.get("vnp_Amount"), Some("100000"));
        assert!(!params.contains_key(SECURE_HASH_KEY));
    }

    #[test]
    fn test_build_params_signs_verifiably() {
        let config = HarnessConfig::new("https://shop.example/ipn").with_secret_key("SECRETKEY1");
        let h = harness(config, "");
        let params = h.build_params(h.case("success").unwrap()).unwrap();

        let key = SecretKey::new("SECRETKEY1");
        assert_eq!(vnp_verify(&params, Some(&key)).unwrap().outcome, SignatureOutcome::Verified);
    }

    #[test]
    fn test_invalid_signature_case_sends_bad_hash() {
        let config = HarnessConfig::new("https://shop.example/ipn").with_secret_key("SECRETKEY1");
        let h = harness(config, "");
        let params = h.build_params(h.case("invalid-signature").unwrap()).unwrap();
        assert_eq!(params.get(SECURE_HASH_KEY), Some("invalid"));

        let unsigned = harness(HarnessConfig::new("https://shop.example/ipn"), "");
        let params = unsigned.build_params(unsigned.case("invalid-signature").unwrap()).unwrap();
        assert_eq!(params.get(SECURE_HASH_KEY), Some("invalid"));
    }

    #[test]
    fn test_signing_replaces_user_supplied_hash() {
        let config = HarnessConfig::new("https://shop.example/ipn")
            .with_secret_key("SECRETKEY1")
            .with_overrides("vnp_SecureHash=abc&vnp_TxnRef=USER");
        let h = harness(config, "");
        let params = h.build_params(h.case("success").unwrap()).unwrap();

        assert_ne!(params.get(SECURE_HASH_KEY), Some("abc"));
        let key = SecretKey::new("SECRETKEY1");
        assert_eq!(vnp_verify(&params, Some(&key)).unwrap().outcome, SignatureOutcome::Verified);
    }

    #[test]
    fn test_unsigned_run_keeps_user_supplied_hash() {
        let config =
            HarnessConfig::new("https://shop.example/ipn").with_overrides("vnp_SecureHash=abc");
        let h = harness(config, "");
        let params = h.build_params(h.case("success").unwrap()).unwrap();
        assert_eq!(params.get(SECURE_HASH_KEY), Some("abc"));
    }

    static TICKS: AtomicI64 = AtomicI64::new(0);

    fn ticking_clock() -> DateTime<Local> {
        let tick = TICKS.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp(1_700_000_000 + tick * 60, 0)
            .unwrap()
            .with_timezone(&Local)
    }

    #[test]
    fn test_build_params_reads_clock_each_call() {
        let config = HarnessConfig::new("https://shop.example/ipn").with_secret_key("SECRETKEY1");
        let h = harness(config, "").with_clock(ticking_clock);
        let case = h.case("success").unwrap().clone();

        let first = h.build_params(&case).unwrap();
        let second = h.build_params(&case).unwrap();
        let (a, b) = (first.get("vnp_CreateDate").unwrap(), second.get("vnp_CreateDate").unwrap());
        assert_eq!(a.len(), TIMESTAMP_LEN);
        assert_ne!(a, b);
        assert_ne!(first.get(SECURE_HASH_KEY), second.get(SECURE_HASH_KEY));
    }

    #[test]
    fn test_signing_disabled() {
        let mut config =
            HarnessConfig::new("https://shop.example/ipn").with_secret_key("SECRETKEY1");
        config.include_secure_hash = false;
        let h = harness(config, "");
        let params = h.build_params(h.case("success").unwrap()).unwrap();
        assert!(!params.contains_key(SECURE_HASH_KEY));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Harness::with_dispatcher(HarnessConfig::default(), Canned::new("")).is_err());
    }

    #[tokio::test]
    async fn test_run_case_with_expectation_override() {
        let h = harness(
            HarnessConfig::new("https://shop.example/ipn"),
            r#"{"RspCode":"01","Message":"Order not found"}"#,
        );
        let never = CancelToken::never();

        let default = h.run_case("success", None, &never).await.unwrap();
        assert_eq!(default.status, CaseStatus::Fail);
        assert_eq!(default.actual_code, "01");

        let custom = Expectation::new("01", "not found");
        let overridden = h.run_case("success", Some(&custom), &never).await.unwrap();
        assert_eq!(overridden.status, CaseStatus::Pass);
        assert_eq!(overridden.expected_code, "01");
    }

    #[tokio::test]
    async fn test_run_case_unknown_id() {
        let h = harness(HarnessConfig::new("https://shop.example/ipn"), "");
        let err = h.run_case("nope", None, &CancelToken::never()).await.unwrap_err();
        assert_eq!(err.code(), VnpErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_run_all_is_sequential_and_complete() {
        let h = harness(
            HarnessConfig::new("https://shop.example/ipn"),
            r#"{"RspCode":"00","Message":"Confirm Success"}"#,
        );
        let report = h.run_all(&CancelToken::never()).await;

        assert_eq!(report.total(), 6);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 5);
        assert!(!report.cancelled);
        assert_eq!(report.summary(), "1/6 passed, 5 failed, 0 errored");

        let sent = h.dispatcher.seen.lock().unwrap();
        let refs: Vec<&str> = sent.iter().map(|p| p.get("vnp_TxnRef").unwrap()).collect();
        assert_eq!(
            refs,
            vec![
                "ORDER123",
                "ORDER_NOT_FOUND",
                "ORDER_ALREADY_CONFIRMED",
                "ORDER_VALID",
                "ORDER123",
                "ORDER_SYSTEM_ERROR",
            ]
        );
    }

    #[tokio::test]
    async fn test_run_all_precancelled() {
        let h = harness(HarnessConfig::new("https://shop.example/ipn"), "");
        let source = CancelSource::new();
        source.cancel();

        let report = h.run_all(&source.token()).await;
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert!(!report.all_passed());
        assert!(h.dispatcher.seen.lock().unwrap().is_empty());
    }
}
