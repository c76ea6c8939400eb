//! Bank OAuth Proxy
//!
//! Authorization code flow and one-shot token refresh in front of bank account APIs.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use bank_oauth_proxy::{
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    oauth::{build_authorization_url, generate_state},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::AuthUrl { state }) => print_auth_url(&config, state),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> bank_oauth_proxy::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host.clone_from(host);
    }
    Ok(config)
}

/// Print an authorization URL
fn print_auth_url(config: &Config, state: Option<String>) -> ExitCode {
    let state = state.unwrap_or_else(generate_state);
    match build_authorization_url(
        &config.oauth.authorization_endpoint,
        &config.oauth.authorization_redirect_uri,
        &config.oauth.client_id,
        &state,
        config.oauth.scope.as_deref(),
    ) {
        Ok(url) => {
            println!("{url}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the proxy server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        auto_authorize = config.oauth.auto_authorize,
        "Starting bank OAuth proxy"
    );

    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}
