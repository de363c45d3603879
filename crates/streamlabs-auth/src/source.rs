//! Where the background refresher gets the current token from
//!
//! The refresher does not know how a token is produced. It asks a
//! `TokenSource` on every tick. `HttpTokenSource` reads the token endpoint
//! exposed by the OAuth backend (`GET /api/token`), which answers
//! `{"access_token": "..."}` once someone has logged in and `404` before that.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::store::AccessToken;

/// Pluggable token supplier for the refresh task.
///
/// Uses `Pin<Box<dyn Future>>` so sources can be held as `Arc<dyn TokenSource>`.
pub trait TokenSource: Send + Sync {
    /// Human-readable origin for logs (usually a URL).
    fn describe(&self) -> &str;

    /// Fetch the current token.
    ///
    /// `TokenUnavailable` means "nothing to hand out yet" and is expected
    /// before the first login; every other failure is `RefreshFailed`.
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<AccessToken>> + Send + '_>>;
}

#[derive(Deserialize)]
struct TokenPayload {
    access_token: String,
}

/// Token source backed by an HTTP endpoint returning `{ "access_token": ... }`.
pub struct HttpTokenSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch_inner(&self) -> Result<AccessToken> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::RefreshFailed(format!("token source request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::TokenUnavailable);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::RefreshFailed(format!(
                "token source returned {status}: {body}"
            )));
        }

        let payload = response
            .json::<TokenPayload>()
            .await
            .map_err(|e| Error::RefreshFailed(format!("invalid token source response: {e}")))?;

        if payload.access_token.is_empty() {
            return Err(Error::RefreshFailed(
                "token source returned an empty access_token".into(),
            ));
        }
        Ok(AccessToken::new(payload.access_token))
    }
}

impl TokenSource for HttpTokenSource {
    fn describe(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<AccessToken>> + Send + '_>> {
        Box::pin(self.fetch_inner())
    }
}
