//! Core workflow state machines.
//!
//! Each service owns one relational state machine over the shared Postgres
//! pool. Every state transition is a single transaction: lock the relevant
//! row(s) `FOR UPDATE`, validate state and actor, mutate state plus dependent
//! ownership/derived records, commit, and only then emit notifications.

pub mod catalog_service;
pub mod profile_service;
pub mod trade_service;
pub mod transfer_service;

use thiserror::Error;

/// Error taxonomy shared by all workflow services.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Entity/row absent, or the caller lacks visibility of it.
    #[error("{0}")]
    NotFound(String),
    /// Caller is not the required role for the row.
    #[error("{0}")]
    Forbidden(String),
    /// Row not in the required source state, or the action was already done.
    #[error("{0}")]
    Conflict(String),
    /// The resource existed but was consumed by another party.
    #[error("{0}")]
    Gone(String),
    /// Empty/invalid selection, self-targeting, malformed input.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
