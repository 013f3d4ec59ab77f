//! Authentication error types.

use thiserror::Error;

use coffee_hub_core::EmailError;

use crate::db::RepositoryError;

/// Errors from the authentication service.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password. Deliberately indistinguishable from an
    /// unknown account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account already exists for this email.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password fails the strength requirements.
    #[error("{0}")]
    WeakPassword(String),

    /// Email address failed validation.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password hashing or verification failed internally.
    #[error("password hash error")]
    Hash,

    /// Database failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
