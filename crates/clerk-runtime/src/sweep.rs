//! Periodic TTL sweeper.

use crate::deps::RouterDeps;
use chrono::Utc;
use clerk_core::constants::SWEEP_INTERVAL_SECS;
use clerk_core::events::OutboundMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn expiry_text(workflow: &'static str) -> &'static str {
    match workflow {
        "file_intent_unclear" => {
            "The files you sent were never attached to a request, so I discarded them."
        }
        _ => "Your in-progress request timed out after a period of inactivity. Please start again.",
    }
}

/// Spawn the background sweep loop. Notices for expired sessions are sent
/// after the store lock is released.
pub fn spawn_sweeper(deps: Arc<RouterDeps>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("sweeper stopped");
                    return;
                }
                _ = tick.tick() => {
                    let notices = deps.store.sweep(Utc::now());
                    for notice in notices {
                        deps.notifier
                            .send(
                                &notice.user,
                                OutboundMessage::Notice {
                                    text: expiry_text(notice.workflow).to_string(),
                                },
                            )
                            .await;
                    }
                }
            }
        }
    })
}
