//! Network dispatch: the only step that leaves the process.
//!
//! | Method | Parameters travel as |
//! |--------|----------------------|
//! | `GET` | URL query; same-named pairs already on the endpoint are replaced |
//! | `POST` | `application/x-www-form-urlencoded` body |
//!
//! The response body is returned whatever the HTTP status: merchants often
//! answer IPN errors with a 4xx/5xx and a perfectly readable body.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use super::config::HttpMethod;
use crate::errors::{InternalReason, VnpError, VnpErrorCode};
use crate::params::ParameterSet;

/// What came back from the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one assembled parameter set to an endpoint.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// # Errors
    ///
    /// `VNP_DISPATCH_FAILED` or `VNP_DISPATCH_TIMEOUT`.
    async fn dispatch(
        &self,
        endpoint: &Url,
        method: HttpMethod,
        params: &ParameterSet,
    ) -> Result<DispatchResponse, VnpError>;
}

/// `endpoint` with `params` set on its query.
pub fn url_with_params(endpoint: &Url, params: &ParameterSet) -> Url {
    let kept: Vec<(String, String)> = endpoint
        .query_pairs()
        .filter(|(k, _)| !params.contains_key(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = endpoint.clone();
    url.set_query(None);
    if !kept.is_empty() || !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        for (k, v) in params.iter() {
            pairs.append_pair(k, v);
        }
    }
    url
}

/// [`Dispatcher`] over `reqwest`.
///
/// Time limits are applied by the harness; a client built with its own
/// timeout still reports `VNP_DISPATCH_TIMEOUT` when it fires.
#[derive(Debug, Clone, Default)]
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(err: reqwest::Error) -> VnpError {
    if err.is_timeout() {
        VnpError::with_reason(
            VnpErrorCode::DispatchTimeout,
            InternalReason::Transport,
            "Endpoint did not respond before the timeout",
        )
    } else {
        VnpError::with_reason(
            VnpErrorCode::DispatchFailed,
            InternalReason::Transport,
            format!("Failed to call IPN URL: {}", err),
        )
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        endpoint: &Url,
        method: HttpMethod,
        params: &ParameterSet,
    ) -> Result<DispatchResponse, VnpError> {
        let request = match method {
            HttpMethod::Get => self.client.get(url_with_params(endpoint, params)),
            HttpMethod::Post => self.client.post(endpoint.clone()).form(params),
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            warn!(status, "endpoint answered with non-success status");
        }

        let body = response.text().await.map_err(transport_error)?;
        debug!(status, bytes = body.len(), "endpoint responded");

        Ok(DispatchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_with_params_replaces_existing() {
        let endpoint = Url::parse("https://shop.example/ipn?token=abc&vnp_TxnRef=OLD").unwrap();
        let params = ParameterSet::from([("vnp_TxnRef", "NEW"), ("vnp_OrderInfo", "IPN test")]);
        let url = url_with_params(&endpoint, &params);

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("token".to_string(), "abc".to_string()),
                ("vnp_OrderInfo".to_string(), "IPN test".to_string()),
                ("vnp_TxnRef".to_string(), "NEW".to_string()),
            ]
        );
    }

    #[test]
    fn test_url_with_no_params_keeps_endpoint() {
        let endpoint = Url::parse("https://shop.example/ipn").unwrap();
        let url = url_with_params(&endpoint, &ParameterSet::new());
        assert_eq!(url.as_str(), "https://shop.example/ipn");
    }
}
