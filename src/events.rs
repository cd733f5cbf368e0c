use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services. Consumers are best-effort:
/// a failed send is logged and never fails the originating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    ItemStatusChanged {
        order_id: Uuid,
        item_id: Uuid,
        new_status: String,
    },
    TableOccupied(Uuid),
    TableReleased(Uuid),
    TableGroupCreated(Uuid),
    TableGroupDisbanded(Uuid),
    PromotionRedeemed {
        promotion_id: Uuid,
        order_id: Uuid,
        discount: Decimal,
    },
    InvoiceGenerated {
        invoice_id: Uuid,
        order_id: Uuid,
    },
    PaymentRecorded {
        invoice_id: Uuid,
        amount: Decimal,
    },
    OrderSettled {
        order_id: Uuid,
        table_id: Option<Uuid>,
    },
    ReservationCreated(Uuid),
    ReservationCancelled(Uuid),
    ReservationCheckedIn {
        reservation_id: Uuid,
        order_id: Uuid,
    },
    ReservationsSwept {
        cancelled: u64,
        swept_at: DateTime<Utc>,
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

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background consumer for domain events. Runs until the channel closes.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderSettled { order_id, table_id } => {
                info!(%order_id, ?table_id, "order settled");
            }
            Event::PromotionRedeemed {
                promotion_id,
                order_id,
                discount,
            } => {
                info!(%promotion_id, %order_id, %discount, "promotion redeemed");
            }
            Event::ReservationsSwept { cancelled, .. } if *cancelled > 0 => {
                warn!(cancelled, "overdue pending reservations cancelled");
            }
            other => {
                info!(event = ?other, "event");
            }
        }
    }
    info!("event processor stopped");
}
