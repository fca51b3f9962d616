//! Periodic reset of stale stops.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::common::CommunityId;

use super::state::{BotState, SharedState};

/// Reset old stops in every map and save the maps that changed.
pub fn sweep_once(state: &mut BotState) -> Vec<CommunityId> {
    let changed = state.reset_old_stops();
    for &community in &changed {
        match state.save_map(community) {
            Ok(()) => info!(community, "Map reset"),
            Err(e) => error!(community, "Failed to save map after reset: {}", e),
        }
    }
    changed
}

/// Run `sweep_once` on every tick until shutdown is signalled.
pub async fn run_sweep(state: SharedState, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut state = state.lock().await;
                let changed = sweep_once(&mut state);
                debug!(changed = changed.len(), "Map sweep finished");
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("Map sweep stopped");
                    break;
                }
            }
        }
    }
}
