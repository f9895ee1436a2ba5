use nodeforged::prelude::*;
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    nodeforge_telemetry::init("nodeforged");

    let config = Config::from_env()?;

    let kernel = Kernel::ignite(config).await.map_err(|e| {
        error!(error = %e, "ignition failed");
        e
    })?;

    kernel.launch().await
}
