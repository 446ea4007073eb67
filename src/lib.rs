//! Integration mesh - a sidecar reverse proxy for integration-enabled apps.
//!
//! The mesh sits in front of a single application and intercepts every inbound
//! request. It classifies the request from its headers, authenticates the caller
//! against the integration service and only then forwards the request to the
//! application, relaying the response unchanged.
//!
//! # Request pipeline
//! 1. Diagnostic info route short-circuits with the mesh version.
//! 2. Correlation id is read from `x-request-id` or generated.
//! 3. The body is buffered (bounded by `limits.max_body_bytes`).
//! 4. The tenant's integration URL is resolved from `x-addon-context`.
//! 5. Bypass rules decide whether validation and authentication are skipped.
//! 6. Headers are validated into a Salesforce or Data Action Target request.
//! 7. The integration service authenticates the request.
//! 8. The request is forwarded to the app.
//!
//! # Quick Example
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use integration_mesh::{HttpClient, HttpClientAdapter, MeshHandler, build_router, config};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg = Arc::new(config::load_config(None)?);
//! let client: Arc<dyn HttpClient> = Arc::new(HttpClientAdapter::new(Duration::from_secs(10))?);
//! let handler = Arc::new(MeshHandler::new(cfg.clone(), client.clone(), client));
//! let listener = tokio::net::TcpListener::bind(cfg.listen_addr()).await?;
//! axum::serve(listener, build_router(handler)).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! Ports (traits) are kept apart from adapters (implementations). Header
//! parsing, bypass rules, tenant lookup and the auth status taxonomy live in
//! `core` and do no I/O.
//!
//! # Error Handling
//! Bootstrap paths return `eyre::Result<T>` with `WrapErr` context. Request
//! paths turn every domain error into a response.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpClientAdapter, MeshHandler, build_router},
    config::MeshConfig,
    ports::http_client::HttpClient,
    utils::{AppProcess, GracefulShutdown, ShutdownReason},
};
