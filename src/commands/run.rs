//! `issue-sync run` command.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::ServiceContext;
use crate::controller::Controller;

/// Execute the `run` command: reconcile continuously until Ctrl-C.
///
/// # Errors
///
/// Returns an error string if no token is configured.
pub async fn run(ctx: &ServiceContext, config: &Config) -> Result<(), String> {
    let reconciler = ctx.reconciler(config).map_err(|e| e.to_string())?;
    let controller = Controller::new(Arc::new(reconciler), Arc::clone(&ctx.store), config.resync);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for interrupt, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    controller.run(shutdown_rx).await;
    Ok(())
}
