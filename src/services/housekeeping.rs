use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::invitation_service::InviteService;

/// Periodically purges pending invites that lapsed more than `retention` ago.
///
/// Expiry itself is evaluated on every request; this only keeps the table
/// from growing with invites nobody will ever open again.
pub fn spawn_lapsed_invite_sweep(
    service: Arc<InviteService>,
    retention: Duration,
    every: StdDuration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match service.purge_lapsed(retention).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged lapsed invites"),
                Err(e) => error!(error = %e, "lapsed invite sweep failed"),
            }
        }
    })
}
