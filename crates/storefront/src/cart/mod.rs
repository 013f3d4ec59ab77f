//! The cart subsystem.
//!
//! A cart has two representations: an anonymous, session-scoped mapping and
//! a per-user persistent table. [`repository`] abstracts over both behind
//! one trait so [`store`] is written once; [`reconcile`] merges the two at
//! login.

pub mod reconcile;
pub mod repository;
pub mod store;

use thiserror::Error;

use crate::db::RepositoryError;

pub use reconcile::{CartChoice, ReconcileOutcome};
pub use repository::{CartBackend, CartKind, CartRepository, RawCartLine};
pub use store::CartStore;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// User input was rejected; the message is safe to show the caller.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity was absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Database failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Session store failure.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}
