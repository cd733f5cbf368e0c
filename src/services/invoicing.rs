use crate::{
    db::DbPool,
    entities::{
        combo, dining_table, dish,
        invoice::{self, ActiveModel as InvoiceActiveModel},
        order::{self, ActiveModel as OrderActiveModel, OrderStatus, OrderType},
        order_item::{self, OrderItemStatus},
        payment_method,
        payment_record::{self, ActiveModel as PaymentRecordActiveModel},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::{clamp_discount, final_total},
    services::orders::OrderResponse,
    services::receipt::{ReceiptData, ReceiptLine, ReceiptPayment, ReceiptRenderer},
    services::tables::release_table,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ApplyDiscountRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentMethodRequest {
    #[validate(length(min = 1, max = 100, message = "Payment method name is required"))]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentRequest {
    pub method_id: Uuid,
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompletePaymentRequest {
    pub method_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecordResponse {
    pub id: Uuid,
    pub payment_method_id: Uuid,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub order_id: Uuid,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub issued_by: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub payments: Vec<PaymentRecordResponse>,
}

impl InvoiceResponse {
    fn from_models(invoice: invoice::Model, payments: Vec<payment_record::Model>) -> Self {
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            order_id: invoice.order_id,
            subtotal: invoice.subtotal,
            discount_amount: invoice.discount_amount,
            final_total: invoice.final_total,
            issued_by: invoice.issued_by,
            issued_at: invoice.issued_at,
            payments: payments
                .into_iter()
                .map(|p| PaymentRecordResponse {
                    id: p.id,
                    payment_method_id: p.payment_method_id,
                    amount: p.amount,
                    paid_at: p.paid_at,
                    notes: p.notes,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementResponse {
    pub order: OrderResponse,
    pub invoice: InvoiceResponse,
}

/// Human-readable invoice number, derived from the invoice id.
pub(crate) fn invoice_number_for(id: Uuid) -> String {
    let simple = id.as_simple().to_string();
    format!("INV-{}", simple[..10].to_uppercase())
}

/// Invoice generation, payment recording and settlement. Settlement is
/// the one path that releases a dine-in table.
#[derive(Clone)]
pub struct InvoicingService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl InvoicingService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send invoicing event");
            }
        }
    }

    /// Get-or-create: a second call for the same order returns the
    /// existing invoice instead of duplicating it.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn generate_invoice(
        &self,
        order_id: Uuid,
        staff_id: Option<Uuid>,
    ) -> Result<InvoiceResponse, ServiceError> {
        let txn = self.db.begin().await?;
        let (invoice, created) = self.get_or_create_in(&txn, order_id, staff_id).await?;
        let payments = self.payments_of(&txn, invoice.id).await?;
        txn.commit().await?;

        if created {
            info!(invoice_id = %invoice.id, order_id = %order_id, "invoice generated");
            self.emit(Event::InvoiceGenerated {
                invoice_id: invoice.id,
                order_id,
            })
            .await;
        }

        Ok(InvoiceResponse::from_models(invoice, payments))
    }

    /// Transactional get-or-create. The unique index on `order_id`
    /// arbitrates concurrent generation; the loser re-reads the winner.
    async fn get_or_create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        staff_id: Option<Uuid>,
    ) -> Result<(invoice::Model, bool), ServiceError> {
        if let Some(existing) = invoice::Entity::find()
            .filter(invoice::Column::OrderId.eq(order_id))
            .one(conn)
            .await?
        {
            return Ok((existing, false));
        }

        let order = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let invoice_id = Uuid::new_v4();
        let model = InvoiceActiveModel {
            id: Set(invoice_id),
            invoice_number: Set(invoice_number_for(invoice_id)),
            order_id: Set(order_id),
            subtotal: Set(order.subtotal),
            discount_amount: Set(order.discount_amount),
            final_total: Set(order.final_total),
            issued_by: Set(staff_id),
            issued_at: Set(Utc::now()),
        };

        match model.insert(conn).await {
            Ok(created) => Ok((created, true)),
            Err(insert_err) => {
                // Lost the check-then-insert race: someone else created it.
                if let Some(existing) = invoice::Entity::find()
                    .filter(invoice::Column::OrderId.eq(order_id))
                    .one(conn)
                    .await?
                {
                    Ok((existing, false))
                } else {
                    Err(ServiceError::DatabaseError(insert_err))
                }
            }
        }
    }

    /// Manual discount. Mutually exclusive with promotion discounts: an
    /// order carries at most one discount source at a time.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn apply_discount(
        &self,
        order_id: Uuid,
        request: ApplyDiscountRequest,
    ) -> Result<OrderResponse, ServiceError> {
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount amount must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Order {} can no longer be discounted",
                order_id
            )));
        }
        if order.discount_amount > Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Order already has a discount".to_string(),
            ));
        }

        let subtotal = order.subtotal;
        let discount = clamp_discount(subtotal, request.amount);
        let version = order.version;

        let mut active: OrderActiveModel = order.into();
        active.discount_amount = Set(discount);
        active.final_total = Set(final_total(subtotal, discount));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        // Mirror the adjustment into an existing unpaid invoice.
        if let Some(existing) = invoice::Entity::find()
            .filter(invoice::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
        {
            let payments = self.payments_of(&txn, existing.id).await?;
            if !payments.is_empty() {
                return Err(ServiceError::Conflict(format!(
                    "Invoice {} already has payments recorded",
                    existing.invoice_number
                )));
            }
            let mut active: InvoiceActiveModel = existing.into();
            active.subtotal = Set(updated.subtotal);
            active.discount_amount = Set(updated.discount_amount);
            active.final_total = Set(updated.final_total);
            active.update(&txn).await?;
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        txn.commit().await?;

        info!(order_id = %order_id, %discount, "manual discount applied");
        Ok(OrderResponse::from_models(updated, items))
    }

    /// Records a payment against an existing invoice. Partial payments
    /// accumulate; an amount beyond the outstanding balance is rejected.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn process_payment(
        &self,
        order_id: Uuid,
        request: PaymentRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let invoice = invoice::Entity::find()
            .filter(invoice::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No invoice exists for order {}", order_id))
            })?;

        self.record_payment_in(&txn, &invoice, request.method_id, request.amount, request.notes)
            .await?;

        let payments = self.payments_of(&txn, invoice.id).await?;
        txn.commit().await?;

        self.emit(Event::PaymentRecorded {
            invoice_id: invoice.id,
            amount: request.amount,
        })
        .await;

        Ok(InvoiceResponse::from_models(invoice, payments))
    }

    /// The authoritative settlement path: get-or-create the invoice, pay
    /// the outstanding balance in full, complete the order and release a
    /// dine-in table, atomically.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn process_complete_payment(
        &self,
        order_id: Uuid,
        request: CompletePaymentRequest,
    ) -> Result<SettlementResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::Conflict(format!(
                "Order {} is cancelled and cannot be settled",
                order_id
            )));
        }

        let (invoice, _created) = self.get_or_create_in(&txn, order_id, None).await?;

        let paid: Decimal = self
            .payments_of(&txn, invoice.id)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();
        let outstanding = invoice.final_total - paid;
        if outstanding <= Decimal::ZERO {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already settled",
                order_id
            )));
        }

        self.record_payment_in(&txn, &invoice, request.method_id, outstanding, request.notes)
            .await?;

        let table_id = order.table_id;
        let order_type = order.order_type;
        let was_completed = order.status == OrderStatus::Completed;
        let version = order.version;

        let updated = if was_completed {
            order
        } else {
            let mut active: OrderActiveModel = order.into();
            active.status = Set(OrderStatus::Completed);
            active.updated_at = Set(Some(Utc::now()));
            active.version = Set(version + 1);
            active.update(&txn).await?
        };

        // Payment completion implies table release for dine-in.
        let mut released_table = None;
        if order_type == OrderType::DineIn {
            if let Some(table_id) = table_id {
                release_table(&txn, table_id).await?;
                released_table = Some(table_id);
            }
        }

        let payments = self.payments_of(&txn, invoice.id).await?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        txn.commit().await?;

        info!(order_id = %order_id, invoice_id = %invoice.id, amount = %outstanding, "order settled");
        self.emit(Event::PaymentRecorded {
            invoice_id: invoice.id,
            amount: outstanding,
        })
        .await;
        self.emit(Event::OrderSettled {
            order_id,
            table_id: released_table,
        })
        .await;
        if let Some(table_id) = released_table {
            self.emit(Event::TableReleased(table_id)).await;
        }

        Ok(SettlementResponse {
            order: OrderResponse::from_models(updated, items),
            invoice: InvoiceResponse::from_models(invoice, payments),
        })
    }

    #[instrument(skip(self, request))]
    pub async fn create_payment_method(
        &self,
        request: CreatePaymentMethodRequest,
    ) -> Result<payment_method::Model, ServiceError> {
        request.validate()?;
        let model = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            active: Set(true),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list_payment_methods(&self) -> Result<Vec<payment_method::Model>, ServiceError> {
        Ok(payment_method::Entity::find()
            .filter(payment_method::Column::Active.eq(true))
            .order_by_asc(payment_method::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<InvoiceResponse, ServiceError> {
        let invoice = invoice::Entity::find_by_id(invoice_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", invoice_id)))?;
        let payments = self.payments_of(&*self.db, invoice.id).await?;
        Ok(InvoiceResponse::from_models(invoice, payments))
    }

    /// Renders the fixed-layout receipt for an invoice. Missing
    /// relations (deleted dish, released table) fall back to
    /// placeholders instead of failing the export.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn export_invoice_receipt(&self, invoice_id: Uuid) -> Result<Vec<u8>, ServiceError> {
        let db = &*self.db;

        let invoice = invoice::Entity::find_by_id(invoice_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", invoice_id)))?;

        let order = order::Entity::find_by_id(invoice.order_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", invoice.order_id))
            })?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await?;

        let table_name = match order.table_id {
            Some(table_id) => Some(
                dining_table::Entity::find_by_id(table_id)
                    .one(db)
                    .await?
                    .map(|t| t.name)
                    .unwrap_or_else(|| "Unknown table".to_string()),
            ),
            None => None,
        };

        let mut lines = Vec::with_capacity(items.len());
        for item in items
            .iter()
            .filter(|item| item.status != OrderItemStatus::Cancelled)
        {
            let name = match (item.dish_id, item.combo_id) {
                (Some(dish_id), _) => dish::Entity::find_by_id(dish_id)
                    .one(db)
                    .await?
                    .map(|d| d.name),
                (_, Some(combo_id)) => combo::Entity::find_by_id(combo_id)
                    .one(db)
                    .await?
                    .map(|c| c.name),
                _ => None,
            }
            .unwrap_or_else(|| "Unknown item".to_string());

            lines.push(ReceiptLine {
                name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.unit_price * Decimal::from(item.quantity),
            });
        }

        let first_payment = payment_record::Entity::find()
            .filter(payment_record::Column::InvoiceId.eq(invoice.id))
            .order_by_asc(payment_record::Column::PaidAt)
            .one(db)
            .await?;
        let payment = match first_payment {
            Some(record) => {
                let method = payment_method::Entity::find_by_id(record.payment_method_id)
                    .one(db)
                    .await?
                    .map(|m| m.name)
                    .unwrap_or_else(|| "Unknown method".to_string());
                Some(ReceiptPayment {
                    method,
                    amount: record.amount,
                })
            }
            None => None,
        };

        let data = ReceiptData {
            invoice_number: invoice.invoice_number.clone(),
            issued_at: invoice.issued_at,
            order_type: order.order_type.to_value(),
            table_name,
            lines,
            subtotal: invoice.subtotal,
            discount: invoice.discount_amount,
            total: invoice.final_total,
            payment,
        };

        Ok(ReceiptRenderer::default().render(&data))
    }

    async fn record_payment_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        invoice: &invoice::Model,
        method_id: Uuid,
        amount: Decimal,
        notes: Option<String>,
    ) -> Result<payment_record::Model, ServiceError> {
        let method = payment_method::Entity::find_by_id(method_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment method {} not found", method_id))
            })?;
        if !method.active {
            return Err(ServiceError::ValidationError(format!(
                "Payment method '{}' is not active",
                method.name
            )));
        }

        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Payment amount must be positive".to_string(),
            ));
        }

        let paid: Decimal = self
            .payments_of(conn, invoice.id)
            .await?
            .iter()
            .map(|p| p.amount)
            .sum();
        let outstanding = invoice.final_total - paid;
        if outstanding <= Decimal::ZERO {
            return Err(ServiceError::Conflict(format!(
                "Invoice {} is already settled",
                invoice.invoice_number
            )));
        }
        if amount > outstanding {
            return Err(ServiceError::ValidationError(format!(
                "Payment of {} exceeds the outstanding balance of {}",
                amount, outstanding
            )));
        }

        Ok(PaymentRecordActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(invoice.id),
            payment_method_id: Set(method_id),
            amount: Set(amount),
            paid_at: Set(Utc::now()),
            notes: Set(notes),
        }
        .insert(conn)
        .await?)
    }

    async fn payments_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        invoice_id: Uuid,
    ) -> Result<Vec<payment_record::Model>, ServiceError> {
        Ok(payment_record::Entity::find()
            .filter(payment_record::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(payment_record::Column::PaidAt)
            .all(conn)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_is_derived_from_the_id() {
        let id = Uuid::new_v4();
        let number = invoice_number_for(id);
        assert!(number.starts_with("INV-"));
        assert_eq!(number.len(), 4 + 10);
        // Deterministic for the same id.
        assert_eq!(number, invoice_number_for(id));
    }

    #[test]
    fn invoice_numbers_differ_per_invoice() {
        assert_ne!(
            invoice_number_for(Uuid::new_v4()),
            invoice_number_for(Uuid::new_v4())
        );
    }
}
