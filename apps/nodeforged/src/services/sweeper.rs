use std::time::Duration;

use nodeforge_models::event::EventKind;
use nodeforge_models::lock::LockChangeKind;
use nodeforge_models::node::NodeChangeKind;
use nodeforge_models::Event;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::state::AppState;

/// Background liveness sweeper: a single ticker, short store transactions
/// per tick, and a diagnostic log line only when something actually
/// changed. Runs in isolation from request handlers — it never takes a
/// handler's connection, only its own via `StoreClient::connection`.
pub fn spawn(state: AppState, interval_duration: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = interval_duration.as_secs(), "liveness sweeper active");

        loop {
            ticker.tick().await;

            match state.nodes.mark_stale_unavailable(state.heartbeat_live_window).await {
                Ok(ids) if !ids.is_empty() => {
                    warn!(count = ids.len(), "nodes marked unavailable by sweeper");
                    for node_id in ids {
                        state.events.publish(Event::new(EventKind::NodeChanged {
                            node_id,
                            kind: NodeChangeKind::HeartbeatLost,
                        }));
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "sweeper failed to scan node heartbeats"),
            }

            match state.locks.expire_stale(state.lock_expiry_window).await {
                Ok(paths) if !paths.is_empty() => {
                    warn!(count = paths.len(), "locks expired by sweeper");
                    for path in paths {
                        state.events.publish(Event::new(EventKind::LockChanged {
                            path,
                            kind: LockChangeKind::Expired,
                        }));
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "sweeper failed to scan file locks"),
            }
        }
    });
}
