//! Donation polling and WebSocket fan-out
//!
//! Turns the Streamlabs donations REST endpoint into a push feed:
//!
//! 1. `spawn_refresh_task` keeps the shared `TokenStore` current from a `TokenSource`
//! 2. `spawn_poll_task` reads the store every tick; without a token the tick does nothing
//! 3. With a token it fetches the donation list from a `DonationSource`
//! 4. Each record, in upstream order, goes to `Broadcaster::broadcast_one`
//! 5. The broadcaster sends it to every open `Subscriber` and drops the ones that fail
//!
//! The two tasks run on independent timers and share nothing but the token store.
//! Records are not deduplicated across ticks.

pub mod broadcast;
pub mod donations;
pub mod error;
pub mod poll;
pub mod refresh;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast::{BroadcastReport, Broadcaster, SendError, Subscriber, SubscriberId};
pub use donations::{DEFAULT_DONATIONS_URL, DonationRecord, DonationSource, HttpDonationSource};
pub use error::{Error, Result};
pub use poll::{PollOutcome, poll_cycle, spawn_poll_task};
pub use refresh::{RefreshOutcome, refresh_cycle, spawn_refresh_task};
