//! Thin HTTP handlers. Request parsing and status mapping only; all workflow
//! logic lives in the services.

pub mod catalog_handlers;
pub mod health_handlers;
pub mod profile_handlers;
pub mod trade_handlers;
pub mod transfer_handlers;
pub mod ws_handlers;
