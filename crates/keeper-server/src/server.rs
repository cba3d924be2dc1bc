use std::sync::Arc;

use tokio::net::TcpListener;

use keeper_ledger::Keeper;

use crate::auth::{CredentialResolver, HexKeyResolver};
use crate::config::KeeperConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Keeper HTTP server.
pub struct KeeperServer {
    config: KeeperConfig,
    state: AppState,
}

impl KeeperServer {
    /// Open the configured ledger and accept hex bearer keys.
    pub fn new(config: KeeperConfig) -> ServerResult<Self> {
        let keeper = config.open_keeper()?;
        Ok(Self::with_keeper(config, keeper, Arc::new(HexKeyResolver)))
    }

    pub fn with_keeper(
        config: KeeperConfig,
        keeper: Keeper,
        resolver: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            config,
            state: AppState { keeper, resolver },
        }
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), self.config.allow_cors)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "keeper server listening");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let config = KeeperConfig {
            ledger_path: None,
            ..KeeperConfig::default()
        };
        let server = KeeperServer::new(config).unwrap();
        assert_eq!(server.config().bind_addr, "127.0.0.1:8081".parse().unwrap());
        let _router = server.router();
    }
}
