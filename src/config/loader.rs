use std::{collections::BTreeMap, path::Path};

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::{MeshConfig, YAML_FILE_NAME};

pub const ENV_INTEGRATION_API_URL: &str = "HEROKU_INTEGRATION_API_URL";
pub const ENV_INTEGRATION_TOKEN: &str = "HEROKU_INTEGRATION_TOKEN";
pub const ENV_BYPASS_ALL_ROUTES: &str = "HEROKU_INTEGRATION_SERVICE_MESH_BYPASS_ALL_ROUTES";
pub const ENV_APP_PORT: &str = "APP_PORT";
pub const ENV_APP_URL: &str = "APP_URL";
pub const ENV_PORT: &str = "PORT";

/// Marker that identifies an environment value as a per-tenant authorization URL.
const TENANT_URL_MARKER: &str = "/addons/";

/// Load configuration from the optional YAML file and the process environment.
///
/// When `config_path` is `None` the default `integration-mesh.yaml` is used if it
/// exists. An explicitly named file must exist.
pub fn load_config(config_path: Option<&Path>) -> Result<MeshConfig> {
    let env: BTreeMap<String, String> = std::env::vars().collect();
    load_config_with_env(config_path, &env)
}

/// Load configuration against the given environment instead of the process one.
pub fn load_config_with_env(
    config_path: Option<&Path>,
    env: &BTreeMap<String, String>,
) -> Result<MeshConfig> {
    let (path, required) = match config_path {
        Some(path) => (path, true),
        None => (Path::new(YAML_FILE_NAME), false),
    };

    let path_str = path
        .to_str()
        .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?;

    let mut builder = Config::builder()
        .add_source(File::new(path_str, FileFormat::Yaml).required(required));

    if let Some(api_url) = env.get(ENV_INTEGRATION_API_URL) {
        builder = builder.set_override("integration.api_url", api_url.as_str())?;
    }
    if let Some(token) = env.get(ENV_INTEGRATION_TOKEN) {
        builder = builder.set_override("integration.token", token.as_str())?;
    }
    if let Some(bypass) = env.get(ENV_BYPASS_ALL_ROUTES) {
        // Anything that is not a boolean leaves every route protected.
        let bypass = bypass.trim().parse::<bool>().unwrap_or(false);
        builder = builder.set_override("bypass_all_routes", bypass)?;
    }
    if let Some(app_port) = env.get(ENV_APP_PORT) {
        builder = builder.set_override("app.port", app_port.as_str())?;
    }
    if let Some(app_url) = env.get(ENV_APP_URL) {
        builder = builder.set_override("app.host", app_url.as_str())?;
    }
    if let Some(port) = env.get(ENV_PORT) {
        let port: u16 = port
            .trim()
            .parse()
            .with_context(|| format!("{ENV_PORT} must be a port number, got '{port}'"))?;
        builder = builder.set_override("port", i64::from(port))?;
    }

    let settings = builder
        .build()
        .with_context(|| format!("Failed to build config from {}", path.display()))?;

    let mut mesh_config: MeshConfig = settings
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize config from {}", path.display()))?;

    mesh_config.tenant_urls.extend(
        env.iter()
            .filter(|(_, value)| value.contains(TENANT_URL_MARKER))
            .map(|(name, value)| (name.clone(), value.clone())),
    );

    Ok(mesh_config)
}
