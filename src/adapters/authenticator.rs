use std::{sync::Arc, time::Duration};

use axum::body::Body as AxumBody;
use http_body_util::BodyExt;
use hyper::{Method, Request, header};
use serde::Serialize;

use crate::{
    config::IntegrationConfig,
    core::{
        auth::{AuthDecision, DataActionTargetAuthRequestBody, SalesforceAuthRequestBody},
        protocol::HDR_OUTBOUND_REQUEST_ID,
        validator::ClassifiedRequest,
    },
    metrics::{ElapsedTimer, TimedOperation, increment_auth_request_total},
    ports::http_client::{HttpClient, HttpClientError},
};

/// Calls the integration service to authorize one classified request.
#[derive(Clone)]
pub struct Authenticator {
    client: Arc<dyn HttpClient>,
    /// Deadline for the whole exchange, response body included.
    timeout: Duration,
}

impl Authenticator {
    pub fn new(client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Authorize `request` against `auth_base_url`.
    ///
    /// `query` and `body` are the inbound query string and buffered body, used
    /// by Data Action Target requests only. Every failure is folded into the
    /// returned [`AuthDecision`].
    pub async fn authenticate(
        &self,
        integration: &IntegrationConfig,
        auth_base_url: &str,
        request: &ClassifiedRequest,
        query: Option<&str>,
        body: &[u8],
    ) -> AuthDecision {
        let request_id = request.correlation_id();

        let (operation, decision, rejection_detail) = match request {
            ClassifiedRequest::Salesforce(salesforce) => {
                let auth_body = SalesforceAuthRequestBody::from(salesforce);
                tracing::info!(
                    request_id = %request_id,
                    org_id = %auth_body.org_id,
                    org_domain_url = %auth_body.org_domain_url,
                    "Authenticating Salesforce request"
                );

                let operation = "Salesforce authentication";
                let url = format!("{auth_base_url}{}", integration.salesforce_auth_path);
                let decision = self
                    .invoke(request_id, operation, &url, &integration.token, &auth_body)
                    .await;
                let detail = format!(
                    "Org {} not found or not connected to app",
                    auth_body.org_id
                );
                (operation, decision, detail)
            }
            ClassifiedRequest::DataActionTarget(target) => {
                let auth_body = DataActionTargetAuthRequestBody::new(target, query, body);
                tracing::info!(
                    request_id = %request_id,
                    org_id = %auth_body.org_id,
                    api_name = %auth_body.api_name,
                    payload_len = auth_body.payload.len(),
                    "Authenticating Data Action Target request"
                );

                let operation = "Data Action Target authentication";
                let url = format!("{auth_base_url}{}", integration.data_action_target_auth_path);
                let decision = self
                    .invoke(request_id, operation, &url, &integration.token, &auth_body)
                    .await;
                let detail = format!(
                    "Org {} not found or not connected to app and/or Data Action Target '{}' signed key not found or is invalid",
                    auth_body.org_id, auth_body.api_name
                );
                (operation, decision, detail)
            }
        };

        match &decision {
            AuthDecision::Authorized => {
                tracing::info!(request_id = %request_id, "Authenticated request");
            }
            AuthDecision::Forbidden => {
                tracing::warn!(request_id = %request_id, "Unauthorized request, {rejection_detail}");
            }
            AuthDecision::Unexpected { status, body } => {
                tracing::error!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    body = %String::from_utf8_lossy(body),
                    "Unexpected {operation} response"
                );
            }
            AuthDecision::TransportFailure => {
                tracing::error!(request_id = %request_id, "Failed to invoke {operation}");
            }
        }

        increment_auth_request_total(request.variant_name(), decision.outcome());
        decision
    }

    /// POST `payload` as JSON and interpret the answer.
    async fn invoke<T: Serialize>(
        &self,
        request_id: &str,
        operation: &'static str,
        url: &str,
        token: &str,
        payload: &T,
    ) -> AuthDecision {
        let _timer = ElapsedTimer::new(request_id, operation, TimedOperation::Authentication);

        let json_body = match serde_json::to_vec(payload) {
            Ok(json_body) => json_body,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to encode {operation} request");
                return AuthDecision::TransportFailure;
            }
        };

        let outbound = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(HDR_OUTBOUND_REQUEST_ID, request_id)
            .body(AxumBody::from(json_body));
        let outbound = match outbound {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to assemble {operation} request");
                return AuthDecision::TransportFailure;
            }
        };

        let exchange = async {
            let response = self.client.send_request(outbound).await?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| HttpClientError::ConnectionError(e.to_string()))?
                .to_bytes();
            Ok::<_, HttpClientError>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                tracing::error!(request_id = %request_id, error = %e, "{operation} request failed");
                return AuthDecision::TransportFailure;
            }
            Err(_) => {
                tracing::error!(
                    request_id = %request_id,
                    timeout_secs = self.timeout.as_secs(),
                    "{operation} request timed out"
                );
                return AuthDecision::TransportFailure;
            }
        };

        tracing::debug!(
            request_id = %request_id,
            status = status.as_u16(),
            "Received {operation} response"
        );
        AuthDecision::from_upstream(status, body)
    }
}
