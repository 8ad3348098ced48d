//! Shared application state carried by the router.

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    notify::{ConnectionRegistry, Notifier},
    services::{
        catalog_service::CatalogService, profile_service::ProfileService,
        trade_service::TradeService, transfer_service::TransferService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub registry: Arc<ConnectionRegistry>,
    pub trades: TradeService,
    pub transfers: TransferService,
    pub profiles: ProfileService,
    pub catalog: CatalogService,
}

impl AppState {
    pub fn new(db: PgPool, registry: Arc<ConnectionRegistry>) -> Self {
        let notifier: Arc<dyn Notifier> = registry.clone();
        Self {
            trades: TradeService::new(db.clone(), notifier.clone()),
            transfers: TransferService::new(db.clone(), notifier.clone()),
            profiles: ProfileService::new(db.clone(), notifier.clone()),
            catalog: CatalogService::new(db.clone(), notifier),
            registry,
            db,
        }
    }
}
