//! In-memory holder for the relay's current access token
//!
//! One token serves every subscriber. The store is either empty (nobody has
//! completed the OAuth flow yet) or holds exactly one token. Writes replace the
//! whole value under a tokio `RwLock`, so readers never observe a partial write.
//! Nothing is persisted: a restart means logging in again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use common::Secret;
use tokio::sync::RwLock;
use tracing::debug;

/// Opaque Streamlabs access token. Redacted in Debug/Display.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value.into()))
    }

    /// Raw token value, for the outbound request that needs it.
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", self.0)
    }
}

/// Process-wide token holder shared via `Arc` by the OAuth exchanger, the
/// refresher and the poller.
#[derive(Default)]
pub struct TokenStore {
    current: RwLock<Option<AccessToken>>,
    updates: AtomicU64,
}

impl TokenStore {
    /// Empty store (the state before anyone logs in).
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the current token, or `None` when no token is set.
    pub async fn get(&self) -> Option<AccessToken> {
        self.current.read().await.clone()
    }

    /// Replace the current token.
    ///
    /// Returns `true` when the stored value actually changed. Every call counts
    /// as one update regardless.
    pub async fn set(&self, token: AccessToken) -> bool {
        let mut current = self.current.write().await;
        self.replace(&mut current, token)
    }

    /// Replace the current token only if nobody has called `set` since
    /// `seen` was read from [`updates`](Self::updates).
    ///
    /// Returns `None` and leaves the store alone when a newer write landed in
    /// between, otherwise whether the stored value changed.
    pub async fn set_if_unchanged(&self, token: AccessToken, seen: u64) -> Option<bool> {
        let mut current = self.current.write().await;
        // The counter only moves under the write lock
        if self.updates() != seen {
            debug!(seen, updates = self.updates(), "stale token write discarded");
            return None;
        }
        Some(self.replace(&mut current, token))
    }

    fn replace(&self, current: &mut Option<AccessToken>, token: AccessToken) -> bool {
        let changed = current.as_ref() != Some(&token);
        *current = Some(token);
        self.updates.fetch_add(1, Ordering::Relaxed);
        debug!(changed, "access token replaced");
        changed
    }

    pub async fn is_present(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Number of successful writes since startup.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}
