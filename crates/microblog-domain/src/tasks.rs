//! Background jobs driven by the domain manager

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::{DomainManager, RevalidationOutcome};

/// Periodically re-check the active custom domain's DNS
///
/// The first check runs one full `interval` after spawning.
pub fn spawn_revalidation(manager: Arc<DomainManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match manager.revalidate().await {
                Ok(RevalidationOutcome::Deactivated(reason)) => {
                    warn!("Custom domain deactivated: {}", reason);
                }
                Ok(_) => {}
                Err(e) => error!("Custom domain re-validation failed: {}", e),
            }
        }
    })
}

/// Restore the active domain's proxy route once at startup
pub fn spawn_startup_sync(manager: Arc<DomainManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match manager.sync_on_startup().await {
            Ok(true) => info!("Custom domain route restored"),
            Ok(false) => {}
            Err(e) => warn!("Startup sync failed: {}", e),
        }
    })
}
