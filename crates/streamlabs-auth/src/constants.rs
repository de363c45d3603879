//! Streamlabs OAuth constants

/// Streamlabs token endpoint used for the authorization-code exchange
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://streamlabs.com/api/v2.0/token";

/// Grant type sent with every code exchange
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
