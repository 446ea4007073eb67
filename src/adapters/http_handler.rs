use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body as AxumBody,
    extract::Request as AxumRequest,
    http::{StatusCode, header, header::HeaderValue},
    routing::any,
};
use eyre::{Result, WrapErr};
use hyper::{Request, Response};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    adapters::{Authenticator, Forwarder},
    config::MeshConfig,
    core::{
        bypass::should_bypass,
        protocol::{HDR_REQUEST_ID, INFO_ROUTE},
        tenant::resolve_auth_base_url,
        validator::validate_request,
    },
    metrics::{ElapsedTimer, TimedOperation, increment_request_total},
    ports::http_client::HttpClient,
    tracing_setup::create_request_span,
};

/// Per-request entry point of the mesh.
///
/// Runs the pipeline: diagnostic route, correlation id, body buffering, tenant
/// resolution, bypass decision, validation, authentication and forwarding.
/// Every domain failure becomes a response here; the only error returned is a
/// failure to build one.
pub struct MeshHandler {
    config: Arc<MeshConfig>,
    authenticator: Authenticator,
    forwarder: Forwarder,
}

impl MeshHandler {
    /// `auth_client` talks to the integration service, `app_client` to the
    /// target application.
    pub fn new(
        config: Arc<MeshConfig>,
        auth_client: Arc<dyn HttpClient>,
        app_client: Arc<dyn HttpClient>,
    ) -> Self {
        let auth_timeout = Duration::from_secs(config.timeouts.auth_secs);
        Self {
            config,
            authenticator: Authenticator::new(auth_client, auth_timeout),
            forwarder: Forwarder::new(app_client),
        }
    }

    /// Main request handler
    pub async fn handle_request(
        &self,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, eyre::Error> {
        if req.uri().path() == INFO_ROUTE {
            return self.handle_info();
        }

        let (request_id, generated) = match req
            .headers()
            .get(HDR_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
        {
            Some(request_id) => (request_id.to_string(), false),
            None => (Uuid::new_v4().to_string(), true),
        };

        let span = create_request_span(req.method().as_str(), req.uri().path(), &request_id);
        if generated {
            span.in_scope(|| {
                tracing::warn!(request_id = %request_id, "Generated {HDR_REQUEST_ID} header");
            });
        }

        let mut response = self
            .process(&request_id, req)
            .instrument(span.clone())
            .await?;

        let status = response.status();
        span.record("http.status_code", status.as_u16());
        increment_request_total(status.as_u16());

        // An id set by the application wins.
        if !response.headers().contains_key(HDR_REQUEST_ID) {
            let request_id_value = HeaderValue::from_str(&request_id)
                .wrap_err("Failed to encode correlation id header")?;
            response.headers_mut().insert(HDR_REQUEST_ID, request_id_value);
        }

        Ok(response)
    }

    async fn process(
        &self,
        request_id: &str,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, eyre::Error> {
        let _timer = ElapsedTimer::new(request_id, "Integration mesh", TimedOperation::Request);
        let config = self.config.as_ref();

        let (parts, body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string();
        tracing::info!(request_id = %request_id, "Processing request to {}", parts.uri.path());

        let body = match axum::body::to_bytes(body, config.limits.max_body_bytes).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to read incoming request body");
                return text_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let auth_base_url = match resolve_auth_base_url(&config.tenant_urls, &parts.headers) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to resolve integration URL");
                return text_response(StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        if should_bypass(request_id, config, &path_and_query) {
            tracing::warn!(
                request_id = %request_id,
                "Bypassing validation and authentication for route {}",
                parts.uri.path()
            );
        } else {
            let classified = match validate_request(request_id, &parts.headers) {
                Ok(classified) => classified,
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Request validation failed");
                    return text_response(e.status_code(), e.to_string());
                }
            };

            let decision = self
                .authenticator
                .authenticate(
                    &config.integration,
                    auth_base_url,
                    &classified,
                    parts.uri.query(),
                    &body,
                )
                .await;
            if !decision.is_authorized() {
                return decision
                    .into_response(request_id)
                    .wrap_err("Failed to build authentication failure response");
            }
        }

        Ok(self
            .forwarder
            .forward(request_id, &config.app_base_url(), &parts, body)
            .await)
    }

    fn handle_info(&self) -> Result<Response<AxumBody>, eyre::Error> {
        let version = self.config.version();
        tracing::info!(version, "Serving mesh info");
        text_response(StatusCode::OK, version)
    }
}

/// Route every path, including `/`, to the handler.
pub fn build_router(handler: Arc<MeshHandler>) -> Router {
    let make_request_route = |handler: Arc<MeshHandler>| {
        any(move |req: AxumRequest| {
            let handler = handler.clone();
            async move {
                match handler.handle_request(req).await {
                    Ok(response) => Ok::<Response<AxumBody>, Infallible>(response),
                    Err(e) => {
                        tracing::error!("Request handling error: {:?}", e);
                        let mut error_response =
                            Response::new(AxumBody::from("Internal Server Error"));
                        *error_response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                        Ok(error_response)
                    }
                }
            }
        })
    };

    Router::new()
        .route("/{*path}", make_request_route(handler.clone()))
        .route("/", make_request_route(handler))
        .layer(TraceLayer::new_for_http())
}

fn text_response(
    status: StatusCode,
    body: impl Into<AxumBody>,
) -> Result<Response<AxumBody>, eyre::Error> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body.into())
        .wrap_err("Failed to build response")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use http_body_util::BodyExt;

    use super::*;
    use crate::ports::http_client::HttpClientResult;

    const ADDON_ID: &str = "a1b2c3";

    /// Answers every request with a fixed status and records what it saw.
    struct StubClient {
        status: StatusCode,
        seen: Mutex<Vec<String>>,
    }

    impl StubClient {
        fn new(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for StubClient {
        async fn send_request(
            &self,
            req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            self.seen.lock().unwrap().push(req.uri().to_string());
            Ok(Response::builder()
                .status(self.status)
                .body(AxumBody::from("stub"))
                .unwrap())
        }
    }

    fn config() -> MeshConfig {
        MeshConfig::builder()
            .integration("https://integration.example.com", "token")
            .app_url("http://127.0.0.1:3000")
            .tenant_url(
                "HEROKU_INTEGRATION_TENANT_URL",
                format!("https://integration.example.com/addons/{ADDON_ID}"),
            )
            .build()
    }

    fn handler(config: MeshConfig, auth: Arc<StubClient>, app: Arc<StubClient>) -> MeshHandler {
        MeshHandler::new(Arc::new(config), auth, app)
    }

    fn addon_context() -> String {
        STANDARD.encode(format!(r#"{{"addonUUID":"{ADDON_ID}"}}"#))
    }

    async fn body_text(response: Response<AxumBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_info_route_returns_version() {
        let auth = StubClient::new(StatusCode::OK);
        let app = StubClient::new(StatusCode::OK);
        let handler = handler(config(), auth.clone(), app.clone());

        let req = Request::builder()
            .uri(INFO_ROUTE)
            .body(AxumBody::empty())
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, env!("CARGO_PKG_VERSION"));
        assert!(auth.calls().is_empty());
        assert!(app.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generated_request_id_is_echoed() {
        let handler = handler(
            config(),
            StubClient::new(StatusCode::OK),
            StubClient::new(StatusCode::OK),
        );
        let req = Request::builder()
            .uri("/api")
            .body(AxumBody::empty())
            .unwrap();

        let response = handler.handle_request(req).await.unwrap();
        let request_id = response.headers().get(HDR_REQUEST_ID).unwrap();
        assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_rejected_before_auth() {
        let auth = StubClient::new(StatusCode::OK);
        let app = StubClient::new(StatusCode::OK);
        let handler = handler(config(), auth.clone(), app.clone());

        let other_tenant = STANDARD.encode(r#"{"addonUUID":"someone-else"}"#);
        let req = Request::builder()
            .uri("/api")
            .header(HDR_REQUEST_ID, "req-1")
            .header("x-addon-context", other_tenant)
            .header("x-signature", "sig")
            .body(AxumBody::empty())
            .unwrap();

        let response = handler.handle_request(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers().get(HDR_REQUEST_ID).unwrap(), "req-1");
        assert!(auth.calls().is_empty());
        assert!(app.calls().is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_status_is_returned() {
        let auth = StubClient::new(StatusCode::OK);
        let handler = handler(config(), auth.clone(), StubClient::new(StatusCode::OK));

        let req = Request::builder()
            .uri("/api")
            .header("x-addon-context", addon_context())
            .body(AxumBody::empty())
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/api")
            .header("x-addon-context", addon_context())
            .header("x-client-context", "client")
            .body(AxumBody::empty())
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(auth.calls().is_empty());
    }

    #[tokio::test]
    async fn test_authorized_request_uses_tenant_url_and_forwards() {
        let auth = StubClient::new(StatusCode::OK);
        let app = StubClient::new(StatusCode::OK);
        let handler = handler(config(), auth.clone(), app.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/hook?orgId=00D1&apiName=target1")
            .header("x-addon-context", addon_context())
            .header("x-signature", "sig")
            .body(AxumBody::from("{}"))
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            auth.calls(),
            vec![format!(
                "https://integration.example.com/addons/{ADDON_ID}/data_action_targets/authenticate"
            )]
        );
        assert_eq!(
            app.calls(),
            vec!["http://127.0.0.1:3000/hook?orgId=00D1&apiName=target1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_forwarded() {
        let app = StubClient::new(StatusCode::OK);
        let handler = handler(config(), StubClient::new(StatusCode::FORBIDDEN), app.clone());

        let req = Request::builder()
            .uri("/hook")
            .header("x-addon-context", addon_context())
            .header("x-signature", "sig")
            .body(AxumBody::empty())
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, "Forbidden");
        assert!(app.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut config = config();
        config.limits.max_body_bytes = 4;
        let app = StubClient::new(StatusCode::OK);
        let handler = handler(config, StubClient::new(StatusCode::OK), app.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/hook")
            .header("x-addon-context", addon_context())
            .body(AxumBody::from("more than four bytes"))
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.calls().is_empty());
    }

    #[tokio::test]
    async fn test_health_route_bypasses_auth() {
        let auth = StubClient::new(StatusCode::OK);
        let app = StubClient::new(StatusCode::OK);
        let handler = handler(config(), auth.clone(), app.clone());

        let req = Request::builder()
            .uri("/healthcheck")
            .header("x-addon-context", addon_context())
            .body(AxumBody::empty())
            .unwrap();
        let response = handler.handle_request(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(auth.calls().is_empty());
        assert_eq!(app.calls().len(), 1);
    }
}
