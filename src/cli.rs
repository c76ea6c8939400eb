//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Bank OAuth proxy - authorization code flow and token refresh in front of bank account APIs
#[derive(Parser, Debug)]
#[command(name = "bank-oauth-proxy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "BANK_PROXY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "BANK_PROXY_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "BANK_PROXY_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "BANK_PROXY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "BANK_PROXY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the proxy server (default)
    Serve,

    /// Print an authorization URL for the configured client.
    ///
    /// For inspection only: a running server accepts callbacks solely for states it issued.
    AuthUrl {
        /// State value to embed (random if omitted)
        #[arg(long)]
        state: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_server_mode() {
        let cli = Cli::try_parse_from(["bank-oauth-proxy"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_auth_url_with_state() {
        let cli = Cli::try_parse_from(["bank-oauth-proxy", "auth-url", "--state", "abc"]).unwrap();
        assert!(matches!(cli.command, Some(Command::AuthUrl { state: Some(ref s) }) if s == "abc"));
    }

    #[test]
    fn parses_port_override() {
        let cli = Cli::try_parse_from(["bank-oauth-proxy", "--port", "9000", "serve"]).unwrap();
        assert_eq!(cli.port, Some(9000));
        assert!(matches!(cli.command, Some(Command::Serve)));
    }
}
