use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response};
use thiserror::Error;

/// Custom error type for outbound HTTP calls
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Connecting to or talking with the remote end failed
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// No response head arrived in time
    #[error("Timeout error after {0} seconds")]
    Timeout(u64),

    /// The request could not be built or has no usable target
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) for the mesh's two outbound hops,
/// the integration service and the target application.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send a request and resolve once the response head is available.
    ///
    /// The response body is streamed; reading it is up to the caller.
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>>;
}
