use std::net::{IpAddr, SocketAddr};

use nodeforge_store::StoreClient;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::routes;
use crate::services::sweeper;
use crate::state::AppState;

/// Composition root: owns the store connection, the assembled `AppState`,
/// and the configured listening port.
pub struct Kernel {
    port: u16,
    state: AppState,
    sweeper_interval: std::time::Duration,
}

impl Kernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: Config) -> anyhow::Result<Self> {
        let store = StoreClient::connect(&config.store_connection, config.store_auth_token.clone()).await?;

        let state = AppState::new(
            store,
            config.signing_key.clone(),
            config.admin_token.clone(),
            config.token_lifetime,
            config.heartbeat_live_window,
            config.lock_expiry_window,
        );

        Ok(Self {
            port: config.port,
            state,
            sweeper_interval: config.sweeper_interval,
        })
    }

    pub async fn launch(self) -> anyhow::Result<()> {
        sweeper::spawn(self.state.clone(), self.sweeper_interval);

        let router = routes::build(self.state);
        let bind_address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.port);

        info!(%bind_address, "nodeforged listening");
        let listener = tokio::net::TcpListener::bind(bind_address).await?;

        if let Err(error) = axum::serve(listener, router).await {
            error!(%error, "server terminated");
            return Err(error.into());
        }

        Ok(())
    }
}
