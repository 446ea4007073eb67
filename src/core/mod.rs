pub mod auth;
pub mod bypass;
pub mod protocol;
pub mod tenant;
pub mod validator;

pub use auth::{AuthDecision, DataActionTargetAuthRequestBody, SalesforceAuthRequestBody};
pub use bypass::should_bypass;
pub use tenant::{TenantError, resolve_auth_base_url};
pub use validator::{ClassifiedRequest, RequestContext, RequestValidationError, validate_request};
