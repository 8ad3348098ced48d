//! art-exchange: ownership workflows for unique digital art objects.
//!
//! Three relational state machines (trades, transfers, profile view
//! permissions) over a single Postgres source of truth, with row-lock-based
//! concurrency control and best-effort websocket notification fan-out.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;
