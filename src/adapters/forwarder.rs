use std::sync::Arc;

use axum::{
    body::Body as AxumBody,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{HeaderMap, Request, StatusCode, header, header::HeaderValue, http::request::Parts};

use crate::{
    core::protocol::{HDR_REQUEST_CONTEXT, HDR_REQUEST_ID},
    metrics::increment_forward_request_total,
    ports::http_client::HttpClient,
};

/// Relays an accepted request to the target application.
#[derive(Clone)]
pub struct Forwarder {
    client: Arc<dyn HttpClient>,
}

impl Forwarder {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Forward the request described by `parts` and `body` to `app_base_url`.
    ///
    /// The path and query are kept as received. A transport failure yields a
    /// 502; otherwise the application's status, headers and body are relayed.
    pub async fn forward(
        &self,
        request_id: &str,
        app_base_url: &str,
        parts: &Parts,
        body: Bytes,
    ) -> Response {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let target_url = format!("{app_base_url}{path_and_query}");

        let outbound = Request::builder()
            .method(parts.method.clone())
            .uri(target_url.as_str())
            .body(AxumBody::from(body));
        let mut outbound = match outbound {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, url = %target_url, "Failed to assemble forward request");
                return Self::bad_gateway(request_id);
            }
        };
        *outbound.headers_mut() = Self::forwarded_headers(request_id, &parts.headers);

        tracing::info!(request_id = %request_id, method = %parts.method, url = %target_url, "Forwarding request");

        let response = match self.client.send_request(outbound).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to forward request");
                return Self::bad_gateway(request_id);
            }
        };

        let status = response.status();
        increment_forward_request_total(status.as_u16());
        tracing::info!(request_id = %request_id, status = status.as_u16(), "Relaying application response");

        // The head is committed once returned, so body errors can only be logged.
        let (parts, body) = response.into_parts();
        let stream_request_id = request_id.to_string();
        let body = body.map_err(move |e| {
            tracing::error!(request_id = %stream_request_id, error = %e, "Failed to relay application response body");
            e
        });

        Response::from_parts(parts, AxumBody::new(body))
    }

    /// Inbound headers minus the signed context, tagged with the correlation id.
    fn forwarded_headers(request_id: &str, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        headers.remove(HDR_REQUEST_CONTEXT);
        // The buffered body is re-framed by the client.
        headers.remove(header::TRANSFER_ENCODING);
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(HDR_REQUEST_ID, value);
        }
        headers
    }

    fn bad_gateway(request_id: &str) -> Response {
        increment_forward_request_total(StatusCode::BAD_GATEWAY.as_u16());
        (
            StatusCode::BAD_GATEWAY,
            format!("Failed to forward request {request_id}"),
        )
            .into_response()
    }
}
