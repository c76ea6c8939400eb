//! Proxy server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::handler::RequestHandler;
use super::router::{AppState, create_router};
use crate::bank::BankApi;
use crate::config::Config;
use crate::oauth::{OAuthClient, TokenStore};
use crate::{Error, Result};

/// Bank OAuth proxy server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Shared state handed to the router
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a new gateway
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or an HTTP client
    /// cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let oauth = Arc::new(OAuthClient::new(config.oauth.clone(), &config.http)?);
        let bank = Arc::new(BankApi::new(config.api.clone(), &config.http)?);
        let store = Arc::new(TokenStore::new());
        let state = Arc::new(AppState {
            handler: RequestHandler::new(oauth, bank, store),
        });

        Ok(Self { config, state })
    }

    /// Router serving this gateway's endpoints
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state), self.config.server.request_timeout)
    }

    /// Run the gateway until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = self.router();
        let listener = TcpListener::bind(addr).await?;

        let base = format!("http://{}:{}", self.config.server.host, self.config.server.port);
        info!("============================================================");
        info!("BANK OAUTH PROXY v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!("Authorize:  GET {base}/auth/authUrl");
        info!("Callback:   GET {base}/auth/callback");
        info!("Resources:  GET {base}/corpaccounts | /corpaccbalance | /corptranshist | /persaccounts");
        if self.config.oauth.auto_authorize {
            warn!("AUTO-AUTHORIZE enabled - codes are obtained without user interaction");
        }
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
