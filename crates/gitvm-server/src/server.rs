use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// HTTP server exposing one ledger directory.
pub struct GitvmServer {
    state: AppState,
}

impl GitvmServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Reconcile the root pointer, then serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let ledger = self.state.ledger.clone();
        let outcome = tokio::task::spawn_blocking(move || ledger.reconcile())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;
        info!(
            ledger = %self.state.ledger.dir().display(),
            root = %outcome.root(),
            "ledger ready"
        );

        let app = self.router();
        let addr = self.state.config.bind_addr;
        let listener = TcpListener::bind(addr).await?;
        info!("GitVM ledger server listening on {addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = GitvmServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:7420".parse().unwrap());
    }

    #[test]
    fn router_builds() {
        let server = GitvmServer::new(ServerConfig::default());
        let _router = server.router();
    }
}
