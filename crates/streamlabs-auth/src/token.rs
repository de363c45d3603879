//! OAuth authorization-code exchange
//!
//! The OAuth callback receives a single-use code from Streamlabs. We POST it,
//! together with the client credentials and redirect URI, to the token endpoint
//! as a form body. Success is decided by the response body alone: if it carries
//! an `access_token`, the exchange worked, whatever the status code says.

use std::sync::Arc;

use common::Secret;
use serde::Deserialize;
use tracing::{info, warn};

use crate::constants::GRANT_TYPE_AUTHORIZATION_CODE;
use crate::error::{Error, Result};
use crate::store::{AccessToken, TokenStore};

/// Registered OAuth application identity.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub token_endpoint: String,
}

/// Raw token endpoint response. Every field is optional because error
/// responses share the same JSON object shape.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A successful exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    pub token_type: Option<String>,
    pub refresh_token: Option<Secret<String>>,
    /// Seconds until expiry, when upstream reports one
    pub expires_in: Option<u64>,
}

/// Exchange an authorization code for an access token.
///
/// Transport errors, non-JSON bodies and bodies without `access_token` all
/// map to `ExchangeFailed`, with the upstream payload kept for diagnostics.
pub async fn exchange_code(
    client: &reqwest::Client,
    oauth: &OAuthClient,
    code: &str,
) -> Result<TokenGrant> {
    let response = client
        .post(&oauth.token_endpoint)
        .form(&[
            ("grant_type", GRANT_TYPE_AUTHORIZATION_CODE),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.expose().as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("code", code),
        ])
        .send()
        .await
        .map_err(|e| Error::ExchangeFailed(format!("token request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::ExchangeFailed(format!("reading token response failed: {e}")))?;

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        Error::ExchangeFailed(format!("token endpoint returned {status}, invalid JSON ({e}): {body}"))
    })?;

    match parsed.access_token {
        Some(token) if !token.is_empty() => Ok(TokenGrant {
            access_token: AccessToken::new(token),
            token_type: parsed.token_type,
            refresh_token: parsed.refresh_token.map(Secret::new),
            expires_in: parsed.expires_in,
        }),
        _ => Err(Error::ExchangeFailed(format!(
            "token endpoint returned {status} without access_token: {body}"
        ))),
    }
}

/// Turns authorization codes into the relay's current token.
///
/// Writes the `TokenStore` exactly once per successful exchange and never on
/// failure.
pub struct OAuthExchanger {
    http: reqwest::Client,
    oauth: OAuthClient,
    store: Arc<TokenStore>,
}

impl OAuthExchanger {
    pub fn new(http: reqwest::Client, oauth: OAuthClient, store: Arc<TokenStore>) -> Self {
        Self { http, oauth, store }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Exchange `code` and store the resulting token.
    ///
    /// A blank code fails with `MissingCode` before any upstream call.
    pub async fn exchange(&self, code: &str) -> Result<AccessToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::MissingCode);
        }

        let grant = match exchange_code(&self.http, &self.oauth, code).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "token exchange failed");
                return Err(e);
            }
        };

        self.store.set(grant.access_token.clone()).await;
        info!(
            token_type = grant.token_type.as_deref().unwrap_or("unknown"),
            expires_in = grant.expires_in,
            has_refresh_token = grant.refresh_token.is_some(),
            "access token stored"
        );
        Ok(grant.access_token)
    }
}
