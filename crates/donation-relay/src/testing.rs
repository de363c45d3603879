//! Test doubles shared by the broadcaster, poller and refresher tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use streamlabs_auth::{AccessToken, TokenSource};

use crate::broadcast::{SendError, Subscriber, SubscriberId};
use crate::donations::{DonationRecord, DonationSource};
use crate::error::Result;

/// How a `RecordingSubscriber` reacts to `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendBehavior {
    Accept,
    Fail,
    Hang,
}

/// Subscriber that records every payload it accepts.
pub struct RecordingSubscriber {
    id: SubscriberId,
    open: AtomicBool,
    behavior: SendBehavior,
    pub received: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl RecordingSubscriber {
    pub fn new(behavior: SendBehavior) -> Self {
        Self {
            id: SubscriberId::new(),
            open: AtomicBool::new(true),
            behavior,
            received: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate the client going away on its own.
    pub fn disconnect(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl Subscriber for RecordingSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send<'a>(
        &'a self,
        payload: &'a str,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<(), SendError>> + Send + 'a>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                SendBehavior::Accept => {
                    self.received.lock().unwrap().push(payload.to_owned());
                    Ok(())
                }
                SendBehavior::Fail => Err(SendError::Transport("broken pipe".into())),
                SendBehavior::Hang => std::future::pending().await,
            }
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.open.store(false, Ordering::SeqCst);
        })
    }
}

/// Donation source that replays scripted responses and counts fetches.
/// Once the script runs out, every fetch returns an empty list.
#[derive(Default)]
pub struct ScriptedDonations {
    pub calls: AtomicUsize,
    pub tokens: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Result<Vec<DonationRecord>>>>,
}

impl ScriptedDonations {
    pub fn new(script: Vec<Result<Vec<DonationRecord>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DonationSource for ScriptedDonations {
    fn fetch<'a>(
        &'a self,
        token: &'a AccessToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DonationRecord>>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.expose().to_owned());
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()));
        Box::pin(async move { next })
    }
}

/// Token source that replays scripted results, optionally taking `delay`
/// per call, and tracks how many calls were in flight at once.
pub struct ScriptedTokens {
    delay: Duration,
    script: Mutex<VecDeque<streamlabs_auth::Result<AccessToken>>>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedTokens {
    pub fn new(script: Vec<streamlabs_auth::Result<AccessToken>>) -> Self {
        Self::with_delay(script, Duration::ZERO)
    }

    pub fn with_delay(script: Vec<streamlabs_auth::Result<AccessToken>>, delay: Duration) -> Self {
        Self {
            delay,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl TokenSource for ScriptedTokens {
    fn describe(&self) -> &str {
        "scripted"
    }

    fn fetch(
        &self,
    ) -> Pin<Box<dyn Future<Output = streamlabs_auth::Result<AccessToken>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(streamlabs_auth::Error::TokenUnavailable))
        })
    }
}

pub fn record(value: serde_json::Value) -> DonationRecord {
    DonationRecord::new(value)
}
