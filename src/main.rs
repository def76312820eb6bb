use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use telemetry_fanout::{AppState, build_app, config::ProxyConfig, observability};

/// Default config file, looked up in the working directory.
const DEFAULT_CONFIG_PATH: &str = "telemetry-fanout.toml";

/// CLI arguments for the telemetry proxy
#[derive(Parser, Debug)]
#[command(version, about = "Edge telemetry proxy with dual-sink forwarding", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./telemetry-fanout.toml if it exists,
    /// otherwise built-in defaults are used)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the proxy server (default)
    Serve,
    /// Load and validate the configuration, then exit
    Check,
    /// Write a default configuration file
    Init {
        /// Path to create the config file (defaults to ./telemetry-fanout.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Check) => run_check(args.config.as_deref()),
        Some(Command::Init { output, force }) => run_init(output, force),
        Some(Command::Serve) | None => run_server(args.config.as_deref()).await,
    }
}

/// Load the config from an explicit path, the default path if present, or
/// built-in defaults. Exits the process on failure.
fn load_config(explicit_path: Option<&str>) -> (ProxyConfig, Option<PathBuf>) {
    let path = match explicit_path {
        Some(path) => Some(PathBuf::from(path)),
        None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };

    let Some(path) = path else {
        return (ProxyConfig::default(), None);
    };

    match ProxyConfig::from_file(&path) {
        Ok(config) => (config, Some(path)),
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn run_check(explicit_path: Option<&str>) {
    let (config, path) = load_config(explicit_path);
    let source = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<built-in defaults>".to_string());

    println!("Configuration OK: {source}");
    println!("  environment:        {}", config.environment);
    println!(
        "  listen:             {}:{}",
        config.server.host, config.server.port
    );
    println!("  forwarding enabled: {}", config.forwarding.enabled);
    println!("  default site:       {}", config.forwarding.default_site);
    match config.secondary.collector() {
        Some(target) => println!("  secondary sink:     {}", target.endpoint),
        None => println!("  secondary sink:     <not configured>"),
    }
}

fn run_init(output: Option<String>, force: bool) {
    let output_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("To start the proxy, run:");
    println!("  telemetry-fanout serve --config {}", output_path.display());
}

fn default_config_toml() -> &'static str {
    r#"# telemetry-fanout configuration
environment = "development"

[server]
host = "0.0.0.0"
port = 8080

[server.cors]
allow_origin = "*"

[forwarding]
# Kill-switch: when false, proxy requests get 200 OK and nothing is forwarded.
enabled = true
default_site = "datadoghq.com"
site_header = "X-Datadog-Site"

# Secondary OTLP/JSON collector. Both keys are required to enable it.
# [secondary]
# endpoint = "https://otel.example.com/v1/logs"
# token = "${COLLECTOR_TOKEN}"

[observability.logging]
level = "info"
format = "compact"
"#
}

async fn run_server(explicit_path: Option<&str>) {
    let (config, path) = load_config(explicit_path);

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    tracing::info!(
        config_file = %path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<defaults>".into()),
        environment = %config.environment,
        forwarding_enabled = config.forwarding.enabled,
        secondary_configured = config.secondary.is_configured(),
        "Starting telemetry proxy"
    );
    for warning in config.startup_warnings() {
        tracing::warn!("{warning}");
    }

    let bind_addr = SocketAddr::new(config.server.host, config.server.port);

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::process::exit(1);
        }
    };

    let app = build_app(state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_template_is_valid() {
        temp_env::with_var_unset("COLLECTOR_TOKEN", || {
            let config = ProxyConfig::from_str(default_config_toml()).unwrap();
            assert!(config.forwarding.enabled);
            assert!(!config.secondary.is_configured());
        });
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let args = Args::try_parse_from(["telemetry-fanout", "--config", "x.toml", "check"]).unwrap();
        assert!(matches!(args.command, Some(Command::Check)));
        assert_eq!(args.config.as_deref(), Some("x.toml"));

        let args = Args::try_parse_from(["telemetry-fanout", "init", "-o", "out.toml", "--force"])
            .unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Init { ref output, force: true }) if output.as_deref() == Some("out.toml")
        ));

        let args = Args::try_parse_from(["telemetry-fanout"]).unwrap();
        assert!(args.command.is_none());
    }
}
