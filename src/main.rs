//! WM Resource Monitor - HTTP front of the resource monitoring agent
//!
//! Serves a status endpoint and Prometheus metrics, optionally behind a
//! TLS-terminating reverse proxy that forwards client certificates.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use wm_resource_monitor::{api, config::CONFIG_ENV_VAR, utils, AppConfig, AppState};

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    help: bool,
    version: bool,
    check_config: bool,
    config: Option<PathBuf>,
}

impl CliArgs {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Result<Self> {
        let mut cli = CliArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => cli.help = true,
                "--version" | "-V" => cli.version = true,
                "--check-config" => cli.check_config = true,
                "--config" | "-c" => {
                    let path = args.next().context("--config requires a path")?;
                    cli.config = Some(PathBuf::from(path));
                }
                other => match other.strip_prefix("--config=") {
                    Some(path) => cli.config = Some(PathBuf::from(path)),
                    None => anyhow::bail!("Unknown argument: {} (see --help)", other),
                },
            }
        }

        Ok(cli)
    }
}

fn main() -> Result<()> {
    let cli = CliArgs::parse(env::args().skip(1))?;

    if cli.help {
        print_help();
        return Ok(());
    }

    if cli.version {
        println!("WM Resource Monitor {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if cli.check_config {
        print_config_summary(&config);
        return Ok(());
    }

    // The guard must be kept alive for the duration of the program
    // to ensure log messages are flushed to files
    let _log_guard = utils::logging::init_logging(&config.logging);

    info!("WM Resource Monitor {} starting up", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded successfully");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    let state = AppState::new(config.clone())?;
    let app = wm_resource_monitor::create_app(state)?;

    info!("Starting HTTP server on http://{}{}", addr, api::APP_PREFIX);
    if config.metrics.enabled {
        info!(
            "Metrics available at {}{}",
            api::API_PREFIX,
            config.metrics.endpoint
        );
    } else {
        info!("Metrics endpoint disabled");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_config_summary(config: &AppConfig) {
    println!("Configuration OK");
    println!("  listen:       {}:{}", config.server.host, config.server.port);
    println!("  workers:      {}", config.server.workers);
    println!("  role source:  {}", config.security.role_source);
    println!("  cert header:  {}", config.security.client_cert_header);
    println!(
        "  logging:      {} ({:?}){}",
        config.logging.level,
        config.logging.format,
        config
            .logging
            .file
            .as_ref()
            .map(|f| format!(", file {}", f.display()))
            .unwrap_or_default()
    );
    if config.metrics.enabled {
        println!("  metrics:      {}{}", api::API_PREFIX, config.metrics.endpoint);
    } else {
        println!("  metrics:      disabled");
    }
}

fn print_help() {
    println!(
        r#"WM Resource Monitor {}

USAGE:
    wm-resource-monitor [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -c, --config <PATH>     Read configuration from PATH
    --check-config          Load and validate the configuration, then exit

ENVIRONMENT:
    {}   Path to configuration file
    WM_MONITOR_HOST     Override server.host
    WM_MONITOR_PORT     Override server.port
    WM_MONITOR_LOG_FORMAT
                        Override logging.format (pretty, json, compact)
    RUST_LOG            Override logging.level

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path given with --config
    2. Path specified by the {} environment variable
    3. ./config/settings.ini
    4. ./settings.ini
    5. /etc/wm-resource-monitor/settings.ini"#,
        env!("CARGO_PKG_VERSION"),
        CONFIG_ENV_VAR,
        CONFIG_ENV_VAR
    );
}
