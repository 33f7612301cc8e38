//! End-to-end IPN harness tests against a mock merchant endpoint.

use std::time::Duration;

use vnpcore::harness::{CancelSource, CancelToken, CaseStatus, Harness, HarnessConfig, HttpMethod};
use vnpcore::{vnp_verify, ParameterSet, ResponseFormat, SecretKey, SignatureOutcome, VnpErrorCode};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const KEY: &str = "SECRETKEY1";

/// A well-behaved merchant IPN handler keyed on `vnp_TxnRef`.
struct MerchantIpn {
    key: SecretKey,
}

impl MerchantIpn {
    fn new() -> Self {
        Self { key: SecretKey::new(KEY) }
    }

    fn params(request: &Request) -> ParameterSet {
        if request.method.as_str() == "POST" {
            ParameterSet::from_query_lossy(&String::from_utf8_lossy(&request.body))
        } else {
            ParameterSet::from_query_lossy(request.url.query().unwrap_or(""))
        }
    }
}

impl Respond for MerchantIpn {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params = Self::params(request);
        let signature = match vnp_verify(&params, Some(&self.key)) {
            Ok(result) => result.outcome,
            Err(_) => return ResponseTemplate::new(500),
        };

        let (code, message) = if signature != SignatureOutcome::Verified {
            ("97", "Invalid signature")
        } else {
            match params.get("vnp_TxnRef").unwrap_or("") {
                "ORDER_NOT_FOUND" => ("01", "Order not found"),
                "ORDER_ALREADY_CONFIRMED" => ("02", "Order already confirmed"),
                "ORDER_VALID" => ("03", "Invalid IP"),
                "ORDER_SYSTEM_ERROR" => ("99", "Unknown error"),
                _ => ("00", "Confirm Success"),
            }
        };

        let body = serde_json::json!({ "RspCode": code, "Message": message });
        ResponseTemplate::new(200).set_body_json(body)
    }
}

fn ipn_url(server: &MockServer) -> String {
    format!("{}/ipn", server.uri())
}

// =========================================================================
// FULL CATALOG
// =========================================================================

mod catalog {
    use super::*;

    #[tokio::test]
    async fn test_always_success_endpoint_passes_only_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "RspCode": "00", "Message": "Confirm Success" }),
            ))
            .expect(6)
            .mount(&server)
            .await;

        let harness = Harness::new(HarnessConfig::new(ipn_url(&server))).unwrap();
        let report = harness.run_all(&CancelToken::never()).await;

        assert_eq!(report.total(), 6);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 5);
        assert_eq!(report.errored, 0);
        assert!(report.results[0].passed());
        assert!(report.results[1..].iter().all(|r| r.status == CaseStatus::Fail));
        assert_eq!(report.summary(), "1/6 passed, 5 failed, 0 errored");
    }

    #[tokio::test]
    async fn test_correct_merchant_passes_everything() {
        let server = MockServer::start().await;
        Mock::given(path("/ipn")).respond_with(MerchantIpn::new()).mount(&server).await;

        let config = HarnessConfig::new(ipn_url(&server)).with_secret_key(KEY);
        let harness = Harness::new(config).unwrap();
        let report = harness.run_all(&CancelToken::never()).await;

        assert!(report.all_passed(), "{:#?}", report.failures());
        for result in &report.results {
            assert_eq!(result.format, Some(ResponseFormat::Json));
            assert_eq!(result.http_status, Some(200));
            assert_eq!(result.actual_code, result.expected_code);
        }
    }

    #[tokio::test]
    async fn test_unsigned_requests_are_rejected_by_merchant() {
        let server = MockServer::start().await;
        Mock::given(path("/ipn")).respond_with(MerchantIpn::new()).mount(&server).await;

        let harness = Harness::new(HarnessConfig::new(ipn_url(&server))).unwrap();
        let report = harness.run_all(&CancelToken::never()).await;

        // only the invalid-signature case expects 97
        assert_eq!(report.passed, 1);
        assert_eq!(report.results[4].id, "invalid-signature");
        assert!(report.results[4].passed());
        assert!(report.results.iter().all(|r| r.actual_code == "97"));
    }
}

// =========================================================================
// TRANSPORT
// =========================================================================

mod transport {
    use super::*;

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ipn"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("vnp_TxnRef=ORDER_NOT_FOUND"))
            .and(body_string_contains("vnp_OrderInfo=IPN+test"))
            .respond_with(MerchantIpn::new())
            .expect(1)
            .mount(&server)
            .await;

        let config = HarnessConfig::new(ipn_url(&server))
            .with_method(HttpMethod::Post)
            .with_secret_key(KEY);
        let harness = Harness::new(config).unwrap();
        let result = harness
            .run_case("order-not-found", None, &CancelToken::never())
            .await
            .unwrap();

        assert!(result.passed());
        assert_eq!(result.actual_message, "Order not found");
    }

    #[tokio::test]
    async fn test_get_replaces_query_pairs_on_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipn"))
            .and(query_param("token", "t"))
            .and(query_param("vnp_TxnRef", "ORDER_SYSTEM_ERROR"))
            .respond_with(MerchantIpn::new())
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}?vnp_TxnRef=STALE&token=t", ipn_url(&server));
        let harness = Harness::new(HarnessConfig::new(endpoint).with_secret_key(KEY)).unwrap();
        let result = harness.run_case("system-error", None, &CancelToken::never()).await.unwrap();

        assert!(result.passed());
        assert_eq!(result.sent.get("vnp_TxnRef"), Some("ORDER_SYSTEM_ERROR"));
    }

    #[tokio::test]
    async fn test_error_status_body_is_still_parsed() {
        let server = MockServer::start().await;
        Mock::given(path("/ipn"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string("RspCode=99&Message=Unknown%20error"),
            )
            .mount(&server)
            .await;

        let harness = Harness::new(HarnessConfig::new(ipn_url(&server))).unwrap();
        let result = harness.run_case("system-error", None, &CancelToken::never()).await.unwrap();

        assert_eq!(result.http_status, Some(500));
        assert_eq!(result.format, Some(ResponseFormat::Querystring));
        assert!(result.passed());
    }
}

// =========================================================================
// FAILURE ISOLATION
// =========================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let harness = Harness::new(HarnessConfig::new("http://127.0.0.1:1/ipn")).unwrap();

        let err = harness.run_case("success", None, &CancelToken::never()).await.unwrap_err();
        assert_eq!(err.code(), VnpErrorCode::DispatchFailed);

        let report = harness.run_all(&CancelToken::never()).await;
        assert_eq!(report.total(), 6);
        assert_eq!(report.errored, 6);
        assert!(!report.cancelled);
        for result in &report.results {
            assert_eq!(result.status, CaseStatus::Error);
            assert!(result.error.is_some());
            assert!(result.actual_code.is_empty());
            assert!(!result.sent.is_empty());
        }
    }

    #[tokio::test]
    async fn test_timeout_isolated_to_one_case() {
        let server = MockServer::start().await;
        Mock::given(query_param("vnp_TxnRef", "ORDER_VALID"))
            .respond_with(MerchantIpn::new().delayed())
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(path("/ipn")).respond_with(MerchantIpn::new()).mount(&server).await;

        let config = HarnessConfig::new(ipn_url(&server))
            .with_secret_key(KEY)
            .with_timeout(Duration::from_millis(300));
        let harness = Harness::new(config).unwrap();
        let report = harness.run_all(&CancelToken::never()).await;

        assert_eq!(report.total(), 6);
        assert_eq!(report.passed, 5);
        assert_eq!(report.errored, 1);
        let slow = &report.results[3];
        assert_eq!(slow.id, "ip-not-allowed");
        assert_eq!(slow.status, CaseStatus::Error);
        assert!(slow.error.as_deref().unwrap_or("").contains("VNP_DISPATCH_TIMEOUT"));
    }

    #[tokio::test]
    async fn test_cancel_mid_run() {
        let server = MockServer::start().await;
        Mock::given(path("/ipn"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let harness = Harness::new(HarnessConfig::new(ipn_url(&server))).unwrap();
        let source = CancelSource::new();
        let token = source.token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            source.cancel();
        });

        let report = harness.run_all(&token).await;
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert!(!report.all_passed());
        assert!(report.summary().ends_with("(cancelled)"));
    }

    #[tokio::test]
    async fn test_cancelled_token_rejects_single_case() {
        let harness = Harness::new(HarnessConfig::new("http://127.0.0.1:1/ipn")).unwrap();
        let source = CancelSource::new();
        source.cancel();

        let err = harness.run_case("success", None, &source.token()).await.unwrap_err();
        assert_eq!(err.code(), VnpErrorCode::Cancelled);
    }
}

impl MerchantIpn {
    fn delayed(self) -> Delayed {
        Delayed(self)
    }
}

/// Same replies, two seconds late.
struct Delayed(MerchantIpn);

impl Respond for Delayed {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.0.respond(request).set_delay(Duration::from_secs(2))
    }
}
