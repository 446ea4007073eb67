//! Classification and validation of the inbound header protocol.
//!
//! A request is either a Salesforce invocation, carrying a signed request context
//! plus a client context, or a Data Action Target callback carrying only a
//! signature. [`validate_request`] decides which one it is and checks the
//! Salesforce credentials structurally. Cryptographic checks are left to the
//! integration service.
use std::fmt;

use axum::http::{HeaderMap, StatusCode};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::protocol::{
    HDR_CLIENT_CONTEXT, HDR_REQUEST_CONTEXT, HDR_REQUEST_ID, HDR_SIGNATURE,
};

/// Errors surfaced by request validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    /// No recognizable credential set was presented.
    #[error("{0}")]
    InvalidRequest(String),

    /// A credential set was presented but is incomplete or inconsistent.
    #[error("{0}")]
    MalformedRequest(String),
}

impl RequestValidationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::UNAUTHORIZED,
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn invalid_context() -> Self {
        Self::MalformedRequest(format!("Invalid {HDR_REQUEST_CONTEXT}"))
    }
}

/// Decoded `x-request-context` payload.
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RequestContext {
    pub id: String,
    pub auth: String,
    #[serde(rename = "loginUrl")]
    pub login_url: String,
    #[serde(rename = "orgDomainUrl")]
    pub org_domain_url: String,
    #[serde(rename = "orgId")]
    pub org_id: String,
    pub resource: String,
    #[serde(rename = "type")]
    pub context_type: String,
    #[serde(rename = "appUUID")]
    pub app_uuid: String,
}

// `auth` is a bearer credential and stays out of logs.
impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("auth", &"<redacted>")
            .field("login_url", &self.login_url)
            .field("org_domain_url", &self.org_domain_url)
            .field("org_id", &self.org_id)
            .field("resource", &self.resource)
            .field("context_type", &self.context_type)
            .field("app_uuid", &self.app_uuid)
            .finish()
    }
}

type FieldAccessor = fn(&RequestContext) -> &str;

/// Fields a request context must carry, all of them non-empty.
const REQUIRED_FIELDS: &[(&str, FieldAccessor)] = &[
    ("id", |c| c.id.as_str()),
    ("auth", |c| c.auth.as_str()),
    ("loginUrl", |c| c.login_url.as_str()),
    ("orgDomainUrl", |c| c.org_domain_url.as_str()),
    ("orgId", |c| c.org_id.as_str()),
    ("resource", |c| c.resource.as_str()),
    ("type", |c| c.context_type.as_str()),
    ("appUUID", |c| c.app_uuid.as_str()),
];

impl RequestContext {
    /// Name of the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .find(|(_, get)| get(self).is_empty())
            .map(|(name, _)| *name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesforceRequest {
    pub correlation_id: String,
    pub context: RequestContext,
    pub client_context: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataActionTargetRequest {
    pub correlation_id: String,
    pub signature: String,
}

/// A validated inbound request, one variant per supported caller type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedRequest {
    Salesforce(SalesforceRequest),
    DataActionTarget(DataActionTargetRequest),
}

impl ClassifiedRequest {
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Salesforce(req) => &req.correlation_id,
            Self::DataActionTarget(req) => &req.correlation_id,
        }
    }

    /// Short label for logs and metrics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Salesforce(_) => "salesforce",
            Self::DataActionTarget(_) => "data_action_target",
        }
    }
}

/// Read a header as text. Empty values count as absent.
fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &str,
) -> Result<Option<&'a str>, RequestValidationError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value.to_str().map_err(|_| {
                RequestValidationError::MalformedRequest(format!("Invalid {name}"))
            })?;
            Ok((!value.is_empty()).then_some(value))
        }
    }
}

/// Classify and validate a request from its headers.
///
/// Pure: returns the same outcome for the same input.
pub fn validate_request(
    correlation_id: &str,
    headers: &HeaderMap,
) -> Result<ClassifiedRequest, RequestValidationError> {
    let request_context = header_str(headers, HDR_REQUEST_CONTEXT)?;
    let client_context = header_str(headers, HDR_CLIENT_CONTEXT)?;

    let (encoded_context, client_context) = match (request_context, client_context) {
        (None, None) => {
            return match header_str(headers, HDR_SIGNATURE)? {
                Some(signature) => {
                    debug!(request_id = %correlation_id, "Classified Data Action Target request");
                    Ok(ClassifiedRequest::DataActionTarget(DataActionTargetRequest {
                        correlation_id: correlation_id.to_string(),
                        signature: signature.to_string(),
                    }))
                }
                None => {
                    warn!(request_id = %correlation_id, "Request carries no recognizable credentials");
                    Err(RequestValidationError::InvalidRequest(format!(
                        "{HDR_REQUEST_CONTEXT} and {HDR_CLIENT_CONTEXT}, or {HDR_SIGNATURE} are required"
                    )))
                }
            };
        }
        (Some(encoded), Some(client)) => (encoded, client),
        (Some(_), None) | (None, Some(_)) => {
            warn!(
                request_id = %correlation_id,
                "Incomplete Salesforce request, {HDR_REQUEST_CONTEXT} and {HDR_CLIENT_CONTEXT} must both be present"
            );
            return Err(RequestValidationError::MalformedRequest(format!(
                "{HDR_REQUEST_CONTEXT} and {HDR_CLIENT_CONTEXT} are both required"
            )));
        }
    };

    let decoded = STANDARD.decode(encoded_context).map_err(|e| {
        warn!(request_id = %correlation_id, error = %e, "Unable to decode {HDR_REQUEST_CONTEXT}");
        RequestValidationError::invalid_context()
    })?;

    let context: RequestContext = serde_json::from_slice(&decoded).map_err(|e| {
        warn!(request_id = %correlation_id, error = %e, "Unable to parse {HDR_REQUEST_CONTEXT}");
        RequestValidationError::invalid_context()
    })?;

    if let Some(field) = context.missing_field() {
        warn!(request_id = %correlation_id, field, "Missing value in {HDR_REQUEST_CONTEXT}");
        return Err(RequestValidationError::invalid_context());
    }

    if !correlation_id.contains(context.id.as_str()) {
        warn!(
            request_id = %correlation_id,
            context_id = %context.id,
            "{HDR_REQUEST_ID} does not contain the request context id"
        );
        return Err(RequestValidationError::MalformedRequest(format!(
            "Invalid {HDR_REQUEST_ID}"
        )));
    }

    debug!(request_id = %correlation_id, org_id = %context.org_id, "Classified Salesforce request");
    Ok(ClassifiedRequest::Salesforce(SalesforceRequest {
        correlation_id: correlation_id.to_string(),
        context,
        client_context: client_context.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    const ORG_ID: &str = "00Dxx0000000000EAA";
    const REQUEST_ID: &str = "00Dxx0000000000EAA-4f6c2b2e-8d7e-4b61-9413-3c5f8f2b9a10";

    fn context_json() -> serde_json::Value {
        json!({
            "id": ORG_ID,
            "auth": "jwt-token",
            "loginUrl": "https://login.example.com",
            "orgDomainUrl": "https://acme.my.example.com",
            "orgId": ORG_ID,
            "resource": "https://api.example.com",
            "type": "user",
            "appUUID": "2c5f7a6e-0f24-4c4b-9a6b-2ac1c7d1d0a1",
        })
    }

    fn encode(value: &serde_json::Value) -> String {
        STANDARD.encode(value.to_string())
    }

    fn salesforce_headers(context: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HDR_REQUEST_CONTEXT, HeaderValue::from_str(context).unwrap());
        headers.insert(HDR_CLIENT_CONTEXT, HeaderValue::from_static("client-context"));
        headers
    }

    #[test]
    fn test_valid_salesforce_request() {
        let headers = salesforce_headers(&encode(&context_json()));
        let classified = validate_request(REQUEST_ID, &headers).unwrap();

        match classified {
            ClassifiedRequest::Salesforce(req) => {
                assert_eq!(req.correlation_id, REQUEST_ID);
                assert_eq!(req.context.org_id, ORG_ID);
                assert_eq!(req.context.app_uuid, "2c5f7a6e-0f24-4c4b-9a6b-2ac1c7d1d0a1");
                assert_eq!(req.client_context, "client-context");
            }
            other => panic!("expected Salesforce request, got {other:?}"),
        }
    }

    #[test]
    fn test_signature_only_is_data_action_target() {
        let mut headers = HeaderMap::new();
        headers.insert(HDR_SIGNATURE, HeaderValue::from_static("sig"));

        let classified = validate_request(REQUEST_ID, &headers).unwrap();
        assert_eq!(
            classified,
            ClassifiedRequest::DataActionTarget(DataActionTargetRequest {
                correlation_id: REQUEST_ID.to_string(),
                signature: "sig".to_string(),
            })
        );
        assert_eq!(classified.variant_name(), "data_action_target");
    }

    #[test]
    fn test_no_credentials_is_invalid() {
        let err = validate_request(REQUEST_ID, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, RequestValidationError::InvalidRequest(_)));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_empty_signature_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(HDR_SIGNATURE, HeaderValue::from_static(""));
        let err = validate_request(REQUEST_ID, &headers).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_only_one_salesforce_header_is_malformed() {
        let mut only_context = HeaderMap::new();
        only_context.insert(
            HDR_REQUEST_CONTEXT,
            HeaderValue::from_str(&encode(&context_json())).unwrap(),
        );
        // A signature does not rescue a half-populated Salesforce request.
        only_context.insert(HDR_SIGNATURE, HeaderValue::from_static("sig"));

        let mut only_client = HeaderMap::new();
        only_client.insert(HDR_CLIENT_CONTEXT, HeaderValue::from_static("client"));

        for headers in [only_context, only_client] {
            let err = validate_request(REQUEST_ID, &headers).unwrap_err();
            assert!(matches!(err, RequestValidationError::MalformedRequest(_)));
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_undecodable_context_is_malformed() {
        let headers = salesforce_headers("not base64!!");
        let err = validate_request(REQUEST_ID, &headers).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let headers = salesforce_headers(&STANDARD.encode("{not json"));
        let err = validate_request(REQUEST_ID, &headers).unwrap_err();
        assert_eq!(err, RequestValidationError::invalid_context());
    }

    #[test]
    fn test_any_empty_field_is_malformed() {
        for (field, _) in REQUIRED_FIELDS {
            let mut context = context_json();
            context[*field] = json!("");
            let headers = salesforce_headers(&encode(&context));

            let err = validate_request(REQUEST_ID, &headers).unwrap_err();
            assert_eq!(
                err,
                RequestValidationError::invalid_context(),
                "empty {field} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut context = context_json();
        context.as_object_mut().unwrap().remove("appUUID");
        let headers = salesforce_headers(&encode(&context));

        let err = validate_request(REQUEST_ID, &headers).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_correlation_id_must_contain_context_id() {
        let headers = salesforce_headers(&encode(&context_json()));
        let err = validate_request("4f6c2b2e-8d7e-4b61-9413-3c5f8f2b9a10", &headers).unwrap_err();
        assert_eq!(
            err,
            RequestValidationError::MalformedRequest(format!("Invalid {HDR_REQUEST_ID}"))
        );
    }

    #[test]
    fn test_truncated_org_id_in_correlation_id_is_rejected() {
        let headers = salesforce_headers(&encode(&context_json()));
        let err = validate_request("00Dxx0000000000-request", &headers).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let headers = salesforce_headers(&encode(&context_json()));
        assert_eq!(
            validate_request(REQUEST_ID, &headers),
            validate_request(REQUEST_ID, &headers)
        );
    }

    #[test]
    fn test_debug_redacts_auth() {
        let context: RequestContext = serde_json::from_value(context_json()).unwrap();
        let rendered = format!("{context:?}");
        assert!(!rendered.contains("jwt-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
