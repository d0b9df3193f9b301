// Catalog lifecycle and read paths
pub mod item_catalog;

// The optimistic-concurrency write path for stock balances
pub mod stock_ledger;

// Append-only corrections to the audit history
pub mod audit_trail;

pub use audit_trail::{AmendEntryCommand, AuditTrailService};
pub use item_catalog::{
    CreateItemCommand, DeletedItemSummary, ImportItemsCommand, ItemCatalogService, ItemDraft,
    ItemListPage, UpdateItemCommand,
};
pub use stock_ledger::{
    AdjustmentMode, AdjustmentOutcome, ApplyAdjustmentCommand, ApplyMovementCommand,
    MovementOutcome, StockLedgerService, MAX_ATTEMPTS,
};
