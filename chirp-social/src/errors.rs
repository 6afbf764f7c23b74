use chirp_core::IntegrationError;
use thiserror::Error;

use crate::DatabaseError;

/// Errors from the social services that aren't covered by a more specific error type
#[derive(Debug, Error)]
pub enum SocialError {
    /// The request doesn't make sense, like following yourself
    #[error("{0}")]
    Invalid(String),
    /// The user isn't allowed to do this
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

impl SocialError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

pub type SocialResult<T> = Result<T, SocialError>;
