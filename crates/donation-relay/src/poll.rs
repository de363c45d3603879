//! Periodic donation polling
//!
//! Every tick: read the token store, fetch the donation list, broadcast each
//! record in order. No token means no fetch. A failed fetch loses that tick's
//! donations; the next tick fetches the current list again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use streamlabs_auth::TokenStore;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::donations::DonationSource;
use crate::telemetry;

/// What one poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No access token yet; nothing fetched
    Idle,
    /// Fetch succeeded and `records` broadcasts were made
    Delivered { records: usize },
    /// Fetch failed; nothing broadcast
    Failed,
}

impl PollOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Idle => "idle",
            PollOutcome::Delivered { .. } => "delivered",
            PollOutcome::Failed => "failed",
        }
    }
}

/// Spawn the donation poller.
///
/// The first tick fires immediately. Ticks missed while a cycle is still
/// running are skipped, so cycles never overlap.
pub fn spawn_poll_task(
    store: Arc<TokenStore>,
    source: Arc<dyn DonationSource>,
    broadcaster: Arc<Broadcaster>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs_f64(), "donation poller started");

        loop {
            ticker.tick().await;
            poll_cycle(&store, source.as_ref(), &broadcaster).await;
        }
    })
}

/// Run one poll tick.
pub async fn poll_cycle(
    store: &TokenStore,
    source: &dyn DonationSource,
    broadcaster: &Broadcaster,
) -> PollOutcome {
    let started = Instant::now();

    let outcome = match store.get().await {
        None => {
            debug!("no access token yet, skipping donation poll");
            PollOutcome::Idle
        }
        Some(token) => match source.fetch(&token).await {
            Ok(records) => {
                for record in &records {
                    info!(
                        donation_id = record.log_id().as_deref().unwrap_or("unknown"),
                        "donation received"
                    );
                    broadcaster.broadcast_one(record).await;
                }
                PollOutcome::Delivered {
                    records: records.len(),
                }
            }
            Err(e) => {
                warn!(error = %e, "donation poll failed, will retry next tick");
                PollOutcome::Failed
            }
        },
    };

    telemetry::record_poll(outcome.label(), started.elapsed().as_secs_f64());
    outcome
}
