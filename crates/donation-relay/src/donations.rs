//! Donation records and the upstream they come from
//!
//! Streamlabs returns `{"data": [ {...}, {...} ]}` from its donations endpoint.
//! Records are passed through untouched: the relay does not interpret their
//! fields beyond picking an id for logs.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use streamlabs_auth::AccessToken;

use crate::error::{Error, Result};

/// Streamlabs donations list endpoint
pub const DEFAULT_DONATIONS_URL: &str = "https://streamlabs.com/api/v1.0/donations";

/// One donation as returned by upstream. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonationRecord(serde_json::Value);

impl DonationRecord {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Compact JSON text, the exact payload pushed to subscribers.
    pub fn to_json(&self) -> String {
        self.0.to_string()
    }

    /// Identifier for logging: `donation_id` (Streamlabs v1) or `id`.
    pub fn log_id(&self) -> Option<String> {
        self.0
            .get("donation_id")
            .or_else(|| self.0.get("id"))
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

#[derive(Deserialize)]
struct DonationList {
    data: Vec<DonationRecord>,
}

/// Upstream donation feed.
///
/// Uses `Pin<Box<dyn Future>>` return types so the poller can hold an
/// `Arc<dyn DonationSource>`.
pub trait DonationSource: Send + Sync {
    /// Fetch the current donation list, in upstream order.
    fn fetch<'a>(
        &'a self,
        token: &'a AccessToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DonationRecord>>> + Send + 'a>>;
}

/// `GET {url}?access_token=...` against the Streamlabs REST API.
pub struct HttpDonationSource {
    client: reqwest::Client,
    url: String,
}

impl HttpDonationSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch_inner(&self, token: &AccessToken) -> Result<Vec<DonationRecord>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("access_token", token.expose())])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let list = response
            .json::<DonationList>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))?;
        Ok(list.data)
    }
}

impl DonationSource for HttpDonationSource {
    fn fetch<'a>(
        &'a self,
        token: &'a AccessToken,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DonationRecord>>> + Send + 'a>> {
        Box::pin(self.fetch_inner(token))
    }
}
