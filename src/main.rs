use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use integration_mesh::{
    AppProcess, GracefulShutdown, HttpClient, HttpClientAdapter, MeshConfig, MeshHandler,
    ShutdownReason, build_router,
    config::{MeshConfigValidator, load_config},
    metrics, tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// YAML configuration file (defaults to ./integration-mesh.yaml when present)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port the mesh listens on, overrides PORT and the config file
    #[clap(short, long, global = true)]
    port: Option<u16>,

    /// Application command to run next to the mesh, e.g. `integration-mesh npm start`
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    app_command: Vec<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Start the mesh, optionally launching the application (default)
    Serve {
        /// Application command to run next to the mesh
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        app_command: Vec<String>,
    },
    /// Validate configuration and exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config_path = args.config.as_deref();

    let app_command = match args.command {
        Some(Commands::Validate) => {
            return validate_config_command(config_path, args.port);
        }
        Some(Commands::Serve { app_command }) => app_command,
        None => args.app_command,
    };

    let mut config = load_config(config_path).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    if let Err(e) = MeshConfigValidator::validate(&config) {
        eprintln!("❌ Configuration validation failed:");
        eprintln!("{e}");
        std::process::exit(1);
    }

    tracing_setup::init_tracing_with_config(&config.logging.level, config.logging.json)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::init_metrics().map_err(|e| eyre!("Failed to initialize metrics: {}", e))?;

    let config = Arc::new(config);
    log_startup(&config);

    let auth_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(Duration::from_secs(config.timeouts.auth_secs))
            .context("Failed to create integration service client")?,
    );
    let app_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(Duration::from_secs(config.timeouts.forward_secs))
            .context("Failed to create application client")?,
    );
    let handler = Arc::new(MeshHandler::new(config.clone(), auth_client, app_client));

    let graceful_shutdown = GracefulShutdown::new();

    let signal_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_shutdown.run_signal_handler().await;
    });

    let app_handle = if app_command.is_empty() {
        tracing::info!("No application command given, serving as a standalone mesh");
        None
    } else {
        let mut app = AppProcess::spawn(&app_command)?;
        let app_shutdown = graceful_shutdown.clone();
        Some(tokio::spawn(async move {
            let status = app.wait().await;
            app_shutdown.trigger_shutdown(ShutdownReason::AppExited);
            status
        }))
    };

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {addr}"))?;
    tracing::info!("Integration mesh listening on {}", addr);

    let server_shutdown = graceful_shutdown.clone();
    axum::serve(listener, build_router(handler))
        .with_graceful_shutdown(async move {
            let reason = server_shutdown.wait_for_shutdown_signal().await;
            tracing::info!("Stopping server: {:?}", reason);
        })
        .await
        .context("Server error")?;

    if let Some(handle) = app_handle {
        match handle.await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => {
                tracing::error!(%status, "Application failed, exiting");
                std::process::exit(1);
            }
            Ok(Err(e)) => {
                tracing::error!("Application error: {:?}", e);
                std::process::exit(1);
            }
            Err(e) => {
                tracing::error!("Application supervisor task failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing::info!("Integration mesh shutdown complete");
    Ok(())
}

fn log_startup(config: &MeshConfig) {
    tracing::info!(
        version = config.version(),
        port = config.port,
        app = %config.app_base_url(),
        integration_api_url = %config.integration.api_url,
        tenants = config.tenant_urls.len(),
        "Starting integration mesh"
    );
    if config.bypass_all_routes {
        tracing::warn!("Validation and authentication are disabled for all routes");
    }
    for route in &config.mesh.authentication.bypass_routes {
        tracing::info!("Bypass route configured: {}", route);
    }
}

fn validate_config_command(config_path: Option<&std::path::Path>, port: Option<u16>) -> Result<()> {
    match config_path {
        Some(path) => println!("🔍 Validating configuration file: {}", path.display()),
        None => println!("🔍 Validating configuration from environment"),
    }

    let mut config = match load_config(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };
    if let Some(port) = port {
        config.port = port;
    }

    match MeshConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr());
            println!("   • Application: {}", config.app_base_url());
            println!("   • Integration API: {}", config.integration.api_url);
            println!("   • Bypass All Routes: {}", config.bypass_all_routes);
            println!(
                "   • Bypass Routes: {}",
                config.mesh.authentication.bypass_routes.len()
            );
            println!("   • Health Check: {}", config.mesh.health_check.enable);
            println!("   • Tenants: {}", config.tenant_urls.len());
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Set HEROKU_INTEGRATION_API_URL and HEROKU_INTEGRATION_TOKEN");
            println!("   • Ensure all URLs start with http:// or https://");
            println!("   • Start bypass and health check routes with '/'");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_app_command() {
        let args = Args::try_parse_from(["integration-mesh", "npm", "start"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.app_command, ["npm", "start"]);
    }

    #[test]
    fn test_app_command_keeps_its_flags() {
        let args = Args::try_parse_from([
            "integration-mesh",
            "-p",
            "9000",
            "node",
            "server.js",
            "--port",
            "3000",
        ])
        .unwrap();
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.app_command, ["node", "server.js", "--port", "3000"]);
    }

    #[test]
    fn test_subcommands_still_parse() {
        let args = Args::try_parse_from(["integration-mesh", "validate"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Validate)));

        let args = Args::try_parse_from(["integration-mesh", "serve", "npm", "start"]).unwrap();
        match args.command {
            Some(Commands::Serve { app_command }) => assert_eq!(app_command, ["npm", "start"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_arguments_runs_standalone() {
        let args = Args::try_parse_from(["integration-mesh"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.app_command.is_empty());
    }
}
