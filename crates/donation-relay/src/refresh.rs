//! Periodic token refresh
//!
//! Spawns a task that asks a `TokenSource` for the current token on a fixed
//! interval and writes it into the shared `TokenStore`. Failures leave the
//! store alone and are retried on the next tick. The task runs independently
//! of the donation poller.

use std::sync::Arc;
use std::time::Duration;

use streamlabs_auth::{TokenSource, TokenStore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::telemetry;

/// What one refresh tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A different token was stored
    Updated,
    /// The source returned the token we already had
    Unchanged,
    /// The source has no token yet
    Unavailable,
    /// A login stored a newer token while the fetch was in flight
    Superseded,
    Failed,
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated => "updated",
            RefreshOutcome::Unchanged => "unchanged",
            RefreshOutcome::Unavailable => "unavailable",
            RefreshOutcome::Superseded => "superseded",
            RefreshOutcome::Failed => "failed",
        }
    }
}

/// Spawn a background task that refreshes the token every `interval`.
///
/// Each refresh is awaited before the next tick is taken, and missed ticks are
/// skipped, so two refreshes never race to write the store.
///
/// Returns a `JoinHandle` for the spawned task.
pub fn spawn_refresh_task(
    store: Arc<TokenStore>,
    source: Arc<dyn TokenSource>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            source = source.describe(),
            interval_secs = interval.as_secs_f64(),
            "token refresher started"
        );

        loop {
            ticker.tick().await;
            refresh_cycle(&store, source.as_ref()).await;
        }
    })
}

/// Run one refresh tick.
///
/// The fetched token is only written if the store was not updated while the
/// fetch was in flight, so a fresh login is never overwritten by an older value.
pub async fn refresh_cycle(store: &TokenStore, source: &dyn TokenSource) -> RefreshOutcome {
    let seen = store.updates();
    let outcome = match source.fetch().await {
        Ok(token) => match store.set_if_unchanged(token, seen).await {
            Some(true) => {
                info!(source = source.describe(), "access token refreshed");
                RefreshOutcome::Updated
            }
            Some(false) => {
                debug!(source = source.describe(), "access token unchanged");
                RefreshOutcome::Unchanged
            }
            None => {
                info!(
                    source = source.describe(),
                    "token replaced during refresh, keeping the newer one"
                );
                RefreshOutcome::Superseded
            }
        },
        Err(streamlabs_auth::Error::TokenUnavailable) => {
            debug!(source = source.describe(), "token source has no token yet");
            RefreshOutcome::Unavailable
        }
        Err(e) => {
            warn!(
                source = source.describe(),
                error = %e,
                "token refresh failed, will retry next tick"
            );
            RefreshOutcome::Failed
        }
    };

    telemetry::record_refresh(outcome.label());
    outcome
}
