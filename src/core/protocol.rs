//! Header names, query parameters and reserved routes of the inbound protocol.

/// Correlation id, echoed back to the caller and bound into the context cross-check.
pub const HDR_REQUEST_ID: &str = "x-request-id";

/// Base64 encoded JSON [`RequestContext`](crate::core::validator::RequestContext).
/// Never forwarded to the application.
pub const HDR_REQUEST_CONTEXT: &str = "x-request-context";

/// Opaque client context sent alongside the signed request context.
pub const HDR_CLIENT_CONTEXT: &str = "x-client-context";

/// Data Action Target signature.
pub const HDR_SIGNATURE: &str = "x-signature";

/// Platform injected base64 encoded JSON carrying the addon identifier.
pub const HDR_ADDON_CONTEXT: &str = "x-addon-context";

/// Correlation header sent on every call to the integration service (`REQUEST_ID`).
pub const HDR_OUTBOUND_REQUEST_ID: &str = "request_id";

pub const QUERY_ORG_ID: &str = "orgId";
pub const QUERY_API_NAME: &str = "apiName";

/// Diagnostic route answering with the mesh version.
pub const INFO_ROUTE: &str = "/__herokuIntegrationServiceMeshInfo";
