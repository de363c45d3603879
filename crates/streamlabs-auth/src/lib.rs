//! Streamlabs OAuth authentication library
//!
//! Owns the relay's single access token and every way it changes:
//! 1. The OAuth callback hands an authorization code to `OAuthExchanger::exchange()`
//! 2. The exchanger POSTs it to the token endpoint and stores the result in `TokenStore`
//! 3. A background task (in `donation-relay`) re-fetches the token from a
//!    `TokenSource` on a timer and overwrites the store
//! 4. The donation poller reads `TokenStore::get()` before every poll
//!
//! Tokens live in memory only and are lost on restart.

pub mod constants;
pub mod error;
pub mod source;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use source::{HttpTokenSource, TokenSource};
pub use store::{AccessToken, TokenStore};
pub use token::{OAuthClient, OAuthExchanger, TokenGrant, exchange_code};
