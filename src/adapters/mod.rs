pub mod authenticator;
pub mod forwarder;
pub mod http_client;
pub mod http_handler;

/// Re-export commonly used types from adapters
pub use authenticator::Authenticator;
pub use forwarder::Forwarder;
pub use http_client::HttpClientAdapter;
pub use http_handler::{MeshHandler, build_router};
