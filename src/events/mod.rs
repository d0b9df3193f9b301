use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Domain events published after a mutation has committed. Consumers see
/// them strictly after the change is durable; a dropped event can never
/// mean a dropped write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ItemCreated {
        item_id: Uuid,
        initial_stock: i32,
    },
    ItemUpdated {
        item_id: Uuid,
    },
    ItemDeleted {
        item_id: Uuid,
        movements_removed: u64,
        audit_entries_removed: u64,
    },
    ItemsImported {
        item_ids: Vec<Uuid>,
    },
    StockReceived {
        item_id: Uuid,
        movement_id: Uuid,
        quantity: i32,
        previous_stock: i32,
        current_stock: i32,
    },
    StockIssued {
        item_id: Uuid,
        movement_id: Uuid,
        quantity: i32,
        previous_stock: i32,
        current_stock: i32,
        recipient: Option<String>,
    },
    StockAdjusted {
        item_id: Uuid,
        mode: String,
        previous_stock: i32,
        current_stock: i32,
    },
    LowStockDetected {
        item_id: Uuid,
        name: String,
        current_stock: i32,
        min_stock: i32,
    },
    AuditEntryAmended {
        original_entry_id: i64,
        amended_entry_id: i64,
        item_id: Uuid,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Failure means the consumer side is
    /// gone or saturated; callers log and move on, they never unwind a
    /// committed mutation over it.
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventPublish(format!("failed to send event: {}", e)))
    }
}

/// Handlers implementing this trait can be plugged into a consumer loop
/// to process events out-of-band (webhooks, reorder workflows).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Drains the event channel and dispatches each event. Runs until every
/// sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::ItemCreated {
                item_id,
                initial_stock,
            } => {
                info!(%item_id, initial_stock, "Item created");
            }
            Event::ItemUpdated { item_id } => {
                info!(%item_id, "Item updated");
            }
            Event::ItemDeleted {
                item_id,
                movements_removed,
                audit_entries_removed,
            } => {
                info!(
                    %item_id,
                    movements_removed, audit_entries_removed,
                    "Item deleted with its history"
                );
            }
            Event::ItemsImported { item_ids } => {
                info!(count = item_ids.len(), "Items imported");
            }
            Event::StockReceived {
                item_id,
                movement_id,
                quantity,
                previous_stock,
                current_stock,
            } => {
                info!(
                    %item_id, %movement_id,
                    quantity, previous_stock, current_stock,
                    "Stock received"
                );
            }
            Event::StockIssued {
                item_id,
                movement_id,
                quantity,
                previous_stock,
                current_stock,
                recipient,
            } => {
                info!(
                    %item_id, %movement_id,
                    quantity, previous_stock, current_stock,
                    recipient = recipient.as_deref().unwrap_or("-"),
                    "Stock issued"
                );
            }
            Event::StockAdjusted {
                item_id,
                mode,
                previous_stock,
                current_stock,
            } => {
                info!(
                    %item_id, %mode,
                    previous_stock, current_stock,
                    "Stock adjusted"
                );
            }
            Event::LowStockDetected {
                item_id,
                name,
                current_stock,
                min_stock,
            } => {
                // Reorder workflows hook in here
                warn!(
                    %item_id, %name,
                    current_stock, min_stock,
                    "Item at or below reorder threshold"
                );
            }
            Event::AuditEntryAmended {
                original_entry_id,
                amended_entry_id,
                item_id,
                occurred_at,
            } => {
                info!(
                    original_entry_id,
                    amended_entry_id,
                    %item_id,
                    %occurred_at,
                    "Audit entry amended"
                );
            }
        }
    }

    warn!("Event processing loop has ended");
}

/// Convenience used by services after commit: send the event and log a
/// delivery failure without propagating it.
pub async fn publish_best_effort(sender: &EventSender, event: Event) {
    if let Err(err) = sender.send(event).await {
        error!("Post-commit event delivery failed: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: Event) -> Result<(), String> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn sender_delivers_to_consumer() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::ItemUpdated {
                item_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(Event::ItemUpdated { .. })));
    }

    #[tokio::test]
    async fn send_reports_closed_channel_as_event_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let err = sender
            .send(Event::ItemUpdated {
                item_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EventPublish(_)));
    }

    #[tokio::test]
    async fn handlers_observe_dispatched_events() {
        let seen = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler { seen: seen.clone() };
        handler
            .handle_event(Event::LowStockDetected {
                item_id: Uuid::new_v4(),
                name: "velcro ties".into(),
                current_stock: 2,
                min_stock: 10,
            })
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
