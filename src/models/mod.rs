//! Core data models for the art-exchange service.
//!
//! These entities represent the workflow rows (trades, pending transfers,
//! profile view requests) and the records they act on. They map cleanly to
//! database tables via `sqlx::FromRow` and serialize naturally as JSON via
//! `serde`.

pub mod art_object;
pub mod profile_request;
pub mod trade;
pub mod transfer;
pub mod user;

/// Stable user identifier resolved by the upstream identity gate.
pub type UserId = i64;
