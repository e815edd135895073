use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use broker_bootstrap::bootstrap::{self, BootstrapContext};
use broker_bootstrap::params::Params;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_thread_ids(true)
        .compact()
        .init();

    let params = Params::parse();
    let ctx = BootstrapContext::new(params.config, params.service);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    match bootstrap::run(ctx, shutdown_rx).await {
        Ok(_) => {
            info!("broker management services are up, press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            let _ = shutdown_tx.send(());
            Ok(())
        }
        Err(e) => {
            error!("bootstrap aborted: {e}");
            Err(e.into())
        }
    }
}
