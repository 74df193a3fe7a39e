//! Error types for the Atlas HTTP client.

use thiserror::Error;

use crate::credentials::CredentialError;

/// Errors raised by [`super::AtlasClient`] before a response is available.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AtlasError {
    /// Raised when the region URL cannot be turned into an API base URL.
    #[error("invalid region URL '{url}': {message}")]
    InvalidUrl {
        /// URL supplied by the caller.
        url: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when an instance identifier cannot be used as a path segment.
    #[error("invalid instance ID '{id}'")]
    InvalidInstanceId {
        /// Identifier supplied by the caller.
        id: String,
    },
    /// Raised when no bearer token could be obtained.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    /// Raised when the request could not be sent or the body not read.
    #[error("transport error: {message}")]
    Transport {
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when a successful response carries an undecodable payload.
    #[error("failed to decode {resource}: {message}")]
    Decode {
        /// Resource being decoded.
        resource: String,
        /// Decoder error message.
        message: String,
    },
}

impl From<reqwest::Error> for AtlasError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}
