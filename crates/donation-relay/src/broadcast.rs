//! Subscriber registry and best-effort fan-out
//!
//! The registry maps `SubscriberId` to a transport-agnostic `Subscriber`.
//! `broadcast_one` serializes a record once, snapshots the registry, and sends
//! to every open subscriber concurrently. Each send is bounded by
//! `send_timeout`. A failed or timed-out send removes that subscriber and
//! nothing else: there is no per-subscriber queue, so a slow client is dropped
//! rather than buffered. Dropped subscribers are closed so the client sees the
//! disconnect and can reconnect.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::donations::DonationRecord;
use crate::telemetry;

/// Unique identity of one subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", self.0.as_simple())
    }
}

/// Why a single delivery failed.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("subscriber connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("send timed out")]
    Timeout,
}

/// One connected consumer, as seen by the broadcaster.
///
/// Implementations own their transport. `send` reports failure through its
/// result and must not panic.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    /// Whether the connection can still take messages.
    fn is_open(&self) -> bool;

    /// Deliver one serialized record.
    fn send<'a>(
        &'a self,
        payload: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'a>>;

    /// Tear down the transport after the broadcaster has dropped this
    /// subscriber. `is_open` must return `false` afterwards.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Counts for one `broadcast_one` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
    /// Registered but no longer open; pruned without a send attempt
    pub skipped: usize,
}

/// Registry of live subscribers plus the fan-out driver.
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    /// Add a newly accepted connection.
    pub async fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = subscriber.id();
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, subscriber);
        info!(subscriber_id = %id, subscribers = subscribers.len(), "subscriber connected");
        telemetry::set_subscribers(subscribers.len());
        id
    }

    /// Remove a connection. Removing an unknown or already-removed id is a no-op.
    ///
    /// Returns whether a subscriber was removed.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let removed = subscribers.remove(&id).is_some();
        if removed {
            info!(subscriber_id = %id, subscribers = subscribers.len(), "subscriber removed");
            telemetry::set_subscribers(subscribers.len());
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Send one record to every subscriber that is registered and open now.
    ///
    /// Never fails: delivery errors are logged, counted in the report, and the
    /// failing subscribers are unregistered.
    pub async fn broadcast_one(&self, record: &DonationRecord) -> BroadcastReport {
        let payload = record.to_json();
        let targets: Vec<Arc<dyn Subscriber>> =
            self.subscribers.read().await.values().cloned().collect();

        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        let mut open = Vec::with_capacity(targets.len());
        for subscriber in targets {
            if subscriber.is_open() {
                open.push(subscriber);
            } else {
                report.skipped += 1;
                dead.push(subscriber);
            }
        }

        let results = join_all(open.into_iter().map(|subscriber| {
            let payload = payload.as_str();
            async move {
                let result = self.deliver(subscriber.as_ref(), payload).await;
                (subscriber, result)
            }
        }))
        .await;

        for (subscriber, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        subscriber_id = %subscriber.id(),
                        error = %e,
                        "delivery failed, dropping subscriber"
                    );
                    report.failed += 1;
                    dead.push(subscriber);
                }
            }
        }

        for subscriber in &dead {
            self.unregister(subscriber.id()).await;
        }
        join_all(dead.iter().map(|subscriber| self.close(subscriber.as_ref()))).await;

        debug!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "donation broadcast"
        );
        telemetry::record_broadcast(&report);
        report
    }

    /// Close a dropped subscriber, bounded by the send timeout.
    async fn close(&self, subscriber: &dyn Subscriber) {
        if tokio::time::timeout(self.send_timeout, subscriber.close())
            .await
            .is_err()
        {
            debug!(subscriber_id = %subscriber.id(), "subscriber close timed out");
        }
    }

    async fn deliver(&self, subscriber: &dyn Subscriber, payload: &str) -> Result<(), SendError> {
        match tokio::time::timeout(self.send_timeout, subscriber.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout),
        }
    }
}
