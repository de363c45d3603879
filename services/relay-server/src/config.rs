//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret is loaded from STREAMLABS_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly to avoid leaking it.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use donation_relay::DEFAULT_DONATIONS_URL;
use streamlabs_auth::{DEFAULT_TOKEN_ENDPOINT, OAuthClient};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub relay: RelayConfig,
}

/// HTTP/WebSocket listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Where the browser lands after the OAuth callback
    pub frontend_url: String,
    /// CORS origins allowed in addition to the frontend's own origin
    #[serde(default = "default_extra_origins")]
    pub extra_origins: Vec<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Streamlabs OAuth application settings
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to STREAMLABS_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// Poller, refresher and fan-out settings
#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_donations_url")]
    pub donations_url: String,
    /// Endpoint the refresher reads the current token from (`GET`, `{ access_token }`)
    pub token_source_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_extra_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_max_connections() -> usize {
    1000
}

fn default_token_endpoint() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

fn default_donations_url() -> String {
    DEFAULT_DONATIONS_URL.to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_send_timeout() -> u64 {
    5000
}

fn default_http_timeout() -> u64 {
    10
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}

fn require_non_zero(field: &str, value: u64) -> common::Result<()> {
    if value == 0 {
        return Err(common::Error::Config(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. STREAMLABS_CLIENT_SECRET env var, unless blank
    /// 2. client_secret_file path from config
    ///
    /// `PORT` overrides the port of `server.listen_addr`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port.trim().parse().map_err(|_| {
                common::Error::Config(format!("PORT must be a valid port number, got: {port}"))
            })?;
            config.server.listen_addr.set_port(port);
        }

        config.validate()?;

        config.oauth.client_secret = std::env::var("STREAMLABS_CLIENT_SECRET")
            .ok()
            .and_then(|secret| Secret::non_blank(&secret));

        // A blank env var falls through to the file
        if config.oauth.client_secret.is_none()
            && let Some(ref secret_file) = config.oauth.client_secret_file
        {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            config.oauth.client_secret = Secret::non_blank(&secret);
        }

        if config.oauth.client_secret.is_none() {
            return Err(common::Error::MissingSecret(
                "client_secret (set STREAMLABS_CLIENT_SECRET or client_secret_file)",
            ));
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        require_http_url("frontend_url", &self.server.frontend_url)?;
        require_http_url("redirect_uri", &self.oauth.redirect_uri)?;
        require_http_url("token_endpoint", &self.oauth.token_endpoint)?;
        require_http_url("donations_url", &self.relay.donations_url)?;
        require_http_url("token_source_url", &self.relay.token_source_url)?;

        require_non_zero("poll_interval_secs", self.relay.poll_interval_secs)?;
        require_non_zero("refresh_interval_secs", self.relay.refresh_interval_secs)?;
        require_non_zero("send_timeout_ms", self.relay.send_timeout_ms)?;
        require_non_zero("http_timeout_secs", self.relay.http_timeout_secs)?;

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// OAuth client identity for the token exchange.
    ///
    /// Only valid on a config returned by `load`, which guarantees the secret.
    pub fn oauth_client(&self) -> common::Result<OAuthClient> {
        let client_secret = self
            .oauth
            .client_secret
            .clone()
            .ok_or(common::Error::MissingSecret("client_secret"))?;
        Ok(OAuthClient {
            client_id: self.oauth.client_id.clone(),
            client_secret,
            redirect_uri: self.oauth.redirect_uri.clone(),
            token_endpoint: self.oauth.token_endpoint.clone(),
        })
    }

    /// Origins allowed by CORS: the frontend's origin plus `extra_origins`.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = Vec::with_capacity(self.server.extra_origins.len() + 1);
        match reqwest::Url::parse(&self.server.frontend_url) {
            Ok(url) => origins.push(url.origin().ascii_serialization()),
            Err(_) => origins.push(self.server.frontend_url.trim_end_matches('/').to_string()),
        }
        for origin in &self.server.extra_origins {
            if !origins.contains(origin) {
                origins.push(origin.clone());
            }
        }
        origins
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("streamlabs-relay.toml")
    }
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
