pub mod audit;
pub mod health;
pub mod items;
pub mod stock;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{AuditTrailService, ItemCatalogService, StockLedgerService};
use std::sync::Arc;
use std::time::Duration;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub item_catalog: Arc<ItemCatalogService>,
    pub stock_ledger: Arc<StockLedgerService>,
    pub audit_trail: Arc<AuditTrailService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        mutation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            item_catalog: Arc::new(ItemCatalogService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            stock_ledger: Arc::new(StockLedgerService::new(
                db_pool.clone(),
                event_sender.clone(),
                mutation_timeout,
            )),
            audit_trail: Arc::new(AuditTrailService::new(db_pool, event_sender)),
        }
    }
}
