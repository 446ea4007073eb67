//! Authorization request bodies and the interpretation of the integration
//! service's answer.
use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use bytes::Bytes;
use serde::Serialize;
use url::form_urlencoded;

use crate::core::{
    protocol::{QUERY_API_NAME, QUERY_ORG_ID},
    validator::{DataActionTargetRequest, SalesforceRequest},
};

#[derive(Serialize, Clone, PartialEq, Eq)]
pub struct SalesforceAuthRequestBody {
    pub org_domain_url: String,
    pub core_jwt_token: String,
    pub org_id: String,
    pub app_uuid: String,
}

impl From<&SalesforceRequest> for SalesforceAuthRequestBody {
    fn from(request: &SalesforceRequest) -> Self {
        let context = &request.context;
        Self {
            org_domain_url: context.org_domain_url.clone(),
            core_jwt_token: context.auth.clone(),
            org_id: context.org_id.clone(),
            app_uuid: context.app_uuid.clone(),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DataActionTargetAuthRequestBody {
    pub api_name: String,
    pub org_id: String,
    pub signature: String,
    /// Raw inbound body, lossily decoded as UTF-8.
    pub payload: String,
}

impl DataActionTargetAuthRequestBody {
    /// Build the body from the classified request, the inbound query string and body.
    pub fn new(request: &DataActionTargetRequest, query: Option<&str>, body: &[u8]) -> Self {
        let mut api_name = None;
        let mut org_id = None;
        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            // First occurrence wins, even when empty.
            if key == QUERY_API_NAME {
                api_name.get_or_insert_with(|| value.into_owned());
            } else if key == QUERY_ORG_ID {
                org_id.get_or_insert_with(|| value.into_owned());
            }
        }

        Self {
            api_name: api_name.unwrap_or_default(),
            org_id: org_id.unwrap_or_default(),
            signature: request.signature.clone(),
            payload: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Outcome of one authorization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// The integration service accepted the caller; forward the request.
    Authorized,
    /// The caller was rejected (upstream 401 or 403).
    Forbidden,
    /// Any other upstream status, relayed to the caller as is.
    Unexpected { status: StatusCode, body: Bytes },
    /// The integration service could not be reached or timed out.
    TransportFailure,
}

impl AuthDecision {
    pub fn from_upstream(status: StatusCode, body: Bytes) -> Self {
        match status {
            StatusCode::OK => Self::Authorized,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Forbidden,
            status => Self::Unexpected { status, body },
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// Label used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Authorized => "authorized",
            Self::Forbidden => "forbidden",
            Self::Unexpected { .. } => "unexpected",
            Self::TransportFailure => "transport_failure",
        }
    }

    /// Status returned to the caller when authorization did not succeed.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authorized => StatusCode::OK,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unexpected { status, .. } => *status,
            Self::TransportFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the rejection sent back to the caller.
    ///
    /// Never called for [`AuthDecision::Authorized`], which falls through to
    /// forwarding.
    pub fn into_response(self, request_id: &str) -> Result<Response<Body>, axum::http::Error> {
        let status = self.status_code();
        let body = match self {
            Self::Authorized => Body::empty(),
            Self::Forbidden => Body::from("Forbidden"),
            Self::Unexpected { body, .. } => Body::from(body),
            Self::TransportFailure => {
                Body::from(format!("Failed to authenticate request {request_id}"))
            }
        };
        Response::builder().status(status).body(body)
    }
}
