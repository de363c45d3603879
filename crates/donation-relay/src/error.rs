//! Error types for donation fetches

/// Why a poll tick was abandoned. All variants are transient: the next tick
/// fetches again.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("donation request failed: {0}")]
    Http(String),

    #[error("donation endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid donation response: {0}")]
    Decode(String),
}

/// Result alias for relay operations.
pub type Result<T> = std::result::Result<T, Error>;
