//! Error types for token exchange and refresh

/// Errors from OAuth token operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The callback arrived without an authorization code. Never reaches upstream.
    #[error("missing authorization code")]
    MissingCode,

    /// Upstream rejected the code, returned no token, or could not be reached.
    /// Carries the raw upstream payload or transport error.
    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The token source answered but has no token to hand out yet (nobody has logged in).
    #[error("token source has no token")]
    TokenUnavailable,
}

impl Error {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingCode => "missing_code",
            Error::ExchangeFailed(_) => "exchange_failed",
            Error::RefreshFailed(_) => "refresh_failed",
            Error::TokenUnavailable => "token_unavailable",
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_failed_keeps_upstream_payload() {
        let err = Error::ExchangeFailed(r#"{"error":"invalid_grant"}"#.into());
        assert!(err.to_string().contains("invalid_grant"), "got: {err}");
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            Error::MissingCode.kind(),
            Error::ExchangeFailed(String::new()).kind(),
            Error::RefreshFailed(String::new()).kind(),
            Error::TokenUnavailable.kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
