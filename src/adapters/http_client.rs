use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use bytes::Bytes;
use eyre::Result;
use hyper::{
    Request, Response, Version,
    body::{Body as HttpBody, Frame, SizeHint},
    header,
    header::HeaderValue,
};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::{Instant, Sleep, sleep, timeout};
use tracing::Instrument;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// HTTP client adapter using Hyper with Rustls.
///
/// One instance exists per outbound hop so that each carries its own timeout.
/// The timeout bounds connecting and receiving the response head, and then
/// the gap between two frames of the response body.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
    timeout: Duration,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter.
    pub fn new(timeout: Duration) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::debug!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::debug!("Created HTTP client with {:?} timeout", timeout);
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> HttpClientResult<Response<AxumBody>> {
        let upstream = format!(
            "{}://{}",
            req.uri().scheme_str().unwrap_or("http"),
            req.uri()
                .authority()
                .map_or_else(|| "unknown".to_string(), |a| a.to_string())
        );

        let span = tracing::debug_span!(
            "outbound_request",
            upstream.url = %upstream,
            http.method = %req.method(),
            http.path = %req.uri().path(),
            http.status_code = tracing::field::Empty,
        );

        // Set Host header from the target URI
        if let Some(host_str) = req.uri().host() {
            let host_header_val = match req.uri().port() {
                Some(port) => HeaderValue::from_str(&format!("{host_str}:{}", port.as_u16())),
                None => HeaderValue::from_str(host_str),
            };
            match host_header_val {
                Ok(value) => {
                    req.headers_mut().insert(header::HOST, value);
                }
                Err(_) => {
                    return Err(HttpClientError::InvalidRequest(format!(
                        "Invalid host in {}",
                        req.uri()
                    )));
                }
            }
        } else {
            tracing::error!("Outgoing URI has no host: {}", req.uri());
            return Err(HttpClientError::InvalidRequest(
                "Outgoing URI has no host".to_string(),
            ));
        }

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let outgoing_request = Request::from_parts(parts, body);

        let timeout_secs = self.timeout.as_secs();
        let result = timeout(self.timeout, self.client.request(outgoing_request))
            .instrument(span.clone())
            .await;

        match result {
            Ok(Ok(response)) => {
                span.record("http.status_code", response.status().as_u16());

                let (mut parts, hyper_body) = response.into_parts();

                // The body is re-framed by the server relaying it.
                parts.headers.remove(header::TRANSFER_ENCODING);

                let body = IdleTimeoutBody::new(AxumBody::new(hyper_body), self.timeout);
                Ok(Response::from_parts(parts, AxumBody::new(body)))
            }
            Ok(Err(e)) => {
                span.record("http.status_code", 599u16);
                tracing::warn!("Request to {} ({} {}) failed: {}", upstream, method, uri, e);
                Err(HttpClientError::ConnectionError(format!(
                    "Request to {method} {uri} failed: {e}"
                )))
            }
            Err(_) => {
                span.record("http.status_code", 599u16);
                tracing::warn!(
                    "Request to {} ({} {}) timed out after {}s",
                    upstream,
                    method,
                    uri,
                    timeout_secs
                );
                Err(HttpClientError::Timeout(timeout_secs))
            }
        }
    }
}

/// Response body that fails when no frame arrives within `idle`.
struct IdleTimeoutBody {
    inner: AxumBody,
    idle: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl IdleTimeoutBody {
    fn new(inner: AxumBody, idle: Duration) -> Self {
        Self {
            inner,
            idle,
            deadline: Box::pin(sleep(idle)),
        }
    }
}

impl HttpBody for IdleTimeoutBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(frame) => {
                this.deadline.as_mut().reset(Instant::now() + this.idle);
                Poll::Ready(frame)
            }
            Poll::Pending => match this.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => Poll::Ready(Some(Err(axum::Error::new(
                    HttpClientError::Timeout(this.idle.as_secs()),
                )))),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = HttpClientAdapter::new(Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_relative_uri_is_rejected() {
        let client = HttpClientAdapter::new(Duration::from_secs(5)).unwrap();
        let req = Request::builder()
            .uri("/no-host")
            .body(AxumBody::empty())
            .unwrap();

        let err = client.send_request(req).await.unwrap_err();
        assert!(matches!(err, HttpClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unreachable_target_is_connection_error() {
        let client = HttpClientAdapter::new(Duration::from_secs(5)).unwrap();
        let req = Request::builder()
            .uri("http://127.0.0.1:1/")
            .body(AxumBody::empty())
            .unwrap();

        let err = client.send_request(req).await.unwrap_err();
        assert!(matches!(err, HttpClientError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn test_response_is_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(202).set_body_string("pong"))
            .mount(&server)
            .await;

        let client = HttpClientAdapter::new(Duration::from_secs(5)).unwrap();
        let req = Request::builder()
            .uri(format!("{}/ping", server.uri()))
            .body(AxumBody::empty())
            .unwrap();

        let response = client.send_request(req).await.unwrap();
        assert_eq!(response.status(), 202);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = HttpClientAdapter::new(Duration::from_secs(1)).unwrap();
        let req = Request::builder()
            .uri(server.uri())
            .body(AxumBody::empty())
            .unwrap();

        let err = client.send_request(req).await.unwrap_err();
        assert!(matches!(err, HttpClientError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nab")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = HttpClientAdapter::new(Duration::from_secs(1)).unwrap();
        let req = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(AxumBody::empty())
            .unwrap();

        let response = client.send_request(req).await.unwrap();
        assert_eq!(response.status(), 200);

        let collected =
            tokio::time::timeout(Duration::from_secs(5), response.into_body().collect()).await;
        assert!(collected.expect("body read should end").is_err());
    }
}
