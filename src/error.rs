//! Error handling and custom error types
//!
//! Avatar processing has its own flat taxonomy ([`AvatarError`]) so callers can
//! map every failure to a client-facing message. Everything else in the crate
//! goes through [`Error`].

use thiserror::Error;

/// Failure of a single avatar processing call.
///
/// Variants carry no causes: internal faults are logged where they happen and
/// surfaced as [`AvatarError::Internal`] only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvatarError {
    #[error("invalid type avatar, supported avatar formats are jpg, jpeg, png, webp, or no animated gif")]
    InvalidType,

    #[error("invalid resolution avatar, supported avatar resolution 1x1")]
    InvalidResolution,

    /// Upload exceeded the configured byte limit before decoding started.
    ///
    /// The one kind added to the base set of `InvalidType`,
    /// `InvalidResolution` and `Internal`. Counts as a validation error.
    #[error("avatar exceeds the maximum upload size of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("internal server error")]
    Internal,
}

impl AvatarError {
    /// Whether the failure was caused by the uploaded content itself.
    pub fn is_validation(&self) -> bool {
        !matches!(self, AvatarError::Internal)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid avatar name: {0:?}")]
    InvalidName(String),
}

impl Error {
    /// Message safe to show to the uploading client.
    pub fn client_message(&self) -> String {
        match self {
            Error::Avatar(e) if e.is_validation() => e.to_string(),
            Error::InvalidName(name) => format!("invalid avatar name {:?}", name),
            _ => AvatarError::Internal.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
