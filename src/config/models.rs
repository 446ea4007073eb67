//! Configuration data structures for the integration mesh.
//!
//! These types map directly to the optional YAML configuration file and to the
//! environment variables the platform injects. Every section carries defaults so
//! that an empty file (or no file at all) still yields a usable snapshot once the
//! required integration credentials are present.
//!
//! A [`MeshConfig`] is built once at startup, validated, wrapped in an `Arc` and
//! never mutated afterwards. Request handlers only ever read it.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default Salesforce authentication API path on the integration service.
pub const SALESFORCE_AUTH_PATH: &str = "/invocations/authentication";

/// Default Data Action Target authentication API path on the integration service.
pub const DATA_ACTION_TARGET_AUTH_PATH: &str = "/data_action_targets/authenticate";

/// Default health check route.
pub const HEALTH_CHECK_ROUTE: &str = "/healthcheck";

/// Default YAML file looked up in the working directory.
pub const YAML_FILE_NAME: &str = "integration-mesh.yaml";

/// Target application settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Scheme and host of the backing application, e.g. `http://127.0.0.1`.
    pub host: String,
    /// Port of the backing application, kept as text as it is spliced into URLs.
    pub port: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1".to_string(),
            port: "3000".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Route patterns that skip validation and authentication.
    ///
    /// A trailing `*` turns the pattern into a prefix match; anything else must
    /// match exactly (optionally followed by a query string).
    pub bypass_routes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enable: bool,
    pub route: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enable: true,
            route: HEALTH_CHECK_ROUTE.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct MeshSettings {
    pub authentication: AuthenticationConfig,
    pub health_check: HealthCheckConfig,
}

/// Connection details for the remote integration (authorization) service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Default authorization base URL. Per-tenant URLs override it per request.
    pub api_url: String,
    /// Bearer token presented on every authorization call.
    pub token: String,
    pub salesforce_auth_path: String,
    pub data_action_target_auth_path: String,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            token: String::new(),
            salesforce_auth_path: SALESFORCE_AUTH_PATH.to_string(),
            data_action_target_auth_path: DATA_ACTION_TARGET_AUTH_PATH.to_string(),
        }
    }
}

/// Outbound timeouts. A timeout is reported exactly like a transport failure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub auth_secs: u64,
    pub forward_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            auth_secs: 10,
            forward_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size buffered in memory.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// Immutable, process-lifetime configuration snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MeshConfig {
    /// Public port the mesh listens on.
    pub port: u16,
    /// Interface the mesh binds to.
    pub bind_host: String,
    pub app: AppConfig,
    pub mesh: MeshSettings,
    pub integration: IntegrationConfig,
    /// Skip validation and authentication for every route.
    pub bypass_all_routes: bool,
    pub timeouts: TimeoutConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
    /// Per-tenant authorization URLs harvested from the environment at load
    /// time, keyed by variable name.
    pub tenant_urls: BTreeMap<String, String>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            port: 8070,
            bind_host: "0.0.0.0".to_string(),
            app: AppConfig::default(),
            mesh: MeshSettings::default(),
            integration: IntegrationConfig::default(),
            bypass_all_routes: false,
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
            tenant_urls: BTreeMap::new(),
        }
    }
}

impl MeshConfig {
    /// Create a new configuration builder
    pub fn builder() -> MeshConfigBuilder {
        MeshConfigBuilder::default()
    }

    /// Address the public listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// Base URL of the target application, without path.
    pub fn app_base_url(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }

    /// Version reported on the diagnostic info route.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

/// Builder for [`MeshConfig`], mostly useful for embedding and tests.
#[derive(Default)]
pub struct MeshConfigBuilder {
    config: MeshConfig,
}

impl MeshConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Point the mesh at the application's base URL (`scheme://host:port`).
    pub fn app_url(mut self, base_url: &str) -> Self {
        match base_url.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                self.config.app.host = host.to_string();
                self.config.app.port = port.to_string();
            }
            _ => self.config.app.host = base_url.to_string(),
        }
        self
    }

    pub fn integration(mut self, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.integration.api_url = api_url.into();
        self.config.integration.token = token.into();
        self
    }

    pub fn bypass_all_routes(mut self, bypass: bool) -> Self {
        self.config.bypass_all_routes = bypass;
        self
    }

    pub fn bypass_route(mut self, pattern: impl Into<String>) -> Self {
        self.config
            .mesh
            .authentication
            .bypass_routes
            .push(pattern.into());
        self
    }

    pub fn health_check(mut self, enable: bool, route: impl Into<String>) -> Self {
        self.config.mesh.health_check = HealthCheckConfig {
            enable,
            route: route.into(),
        };
        self
    }

    pub fn tenant_url(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.config.tenant_urls.insert(name.into(), url.into());
        self
    }

    pub fn timeouts(mut self, auth_secs: u64, forward_secs: u64) -> Self {
        self.config.timeouts = TimeoutConfig {
            auth_secs,
            forward_secs,
        };
        self
    }

    pub fn build(self) -> MeshConfig {
        self.config
    }
}
