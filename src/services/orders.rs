use crate::{
    db::DbPool,
    entities::{order, order_line, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{cart, inventory, pricing},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Name recorded when the caller supplies no resolved customer name.
const GUEST_CUSTOMER_NAME: &str = "Guest";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub user_id: Uuid,
    pub shipping_method_id: Uuid,
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,
    /// Display name resolved by the caller's identity layer.
    pub customer_name: Option<String>,
    pub coupon_code: Option<String>,
    /// Recorded verbatim; payment processing happens elsewhere.
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceOrderReceipt {
    pub order_id: Uuid,
    pub order_code: String,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: order::Model,
    pub lines: Vec<order_line::Model>,
}

#[derive(Debug, Serialize)]
pub struct OrderListPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service owning order fulfillment and the order record lifecycle.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Converts the user's cart into a persisted order.
    ///
    /// Cart snapshot, stock checks, pricing, the order and line inserts,
    /// the stock decrements and the cart clearing all share one
    /// transaction. An error at any step (including a stock race lost to a
    /// concurrent checkout) rolls the whole attempt back: no partial
    /// order, no partial decrement, no partially cleared cart.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<PlaceOrderReceipt, ServiceError> {
        // Reject malformed input before touching the store.
        request.validate()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start fulfillment transaction");
            ServiceError::DatabaseError(e)
        })?;

        let lines = cart::load_snapshot(&txn, request.user_id).await?;

        // Cheap pre-check against the snapshot, for a precise error before
        // any write. The guarded decrement below remains the authoritative
        // gate under concurrency.
        for line in &lines {
            if line.quantity > line.available_stock {
                return Err(ServiceError::InsufficientStock(line.product_id));
            }
        }

        let quote = pricing::quote(
            &txn,
            &lines,
            request.shipping_method_id,
            request.coupon_code.as_deref(),
        )
        .await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_code = generate_order_code(now);
        let customer_name = request
            .customer_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| GUEST_CUSTOMER_NAME.to_string());

        order::ActiveModel {
            id: Set(order_id),
            code: Set(order_code.clone()),
            user_id: Set(request.user_id),
            customer_name: Set(customer_name),
            phone: Set(request.phone.clone()),
            shipping_address: Set(request.shipping_address.clone()),
            sub_total: Set(quote.sub_total),
            shipping_fee: Set(quote.shipping_fee),
            discount: Set(quote.discount),
            total_amount: Set(quote.grand_total),
            status: Set(OrderStatus::Pending),
            shipping_method_id: Set(request.shipping_method_id),
            coupon_code: Set(request.coupon_code.clone()),
            payment_method: Set(request.payment_method.clone()),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        for line in &lines {
            order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.line_total()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            inventory::deduct(&txn, line.product_id, line.quantity).await?;
        }

        cart::clear(&txn, request.user_id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit fulfillment transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            code = %order_code,
            total = %quote.grand_total,
            "Order placed"
        );

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                order_code: order_code.clone(),
            })
            .await;

        Ok(PlaceOrderReceipt {
            order_id,
            order_code,
            total_amount: quote.grand_total,
        })
    }

    /// Retrieves an order with its lines.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderDetail>, ServiceError> {
        let db = &*self.db;

        let Some(order) = order::Entity::find_by_id(order_id).one(db).await? else {
            return Ok(None);
        };

        let lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        Ok(Some(OrderDetail { order, lines }))
    }

    /// Lists a user's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(orders)
    }

    /// Lists all orders with pagination.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListPage, ServiceError> {
        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderListPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Moves an order to a new lifecycle status.
    ///
    /// Transitions are checked against [`OrderStatus::can_transition_to`];
    /// `force` is the administrative override that permits any transition
    /// (and is logged as such).
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        force: bool,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;

        if old_status != new_status && !old_status.can_transition_to(new_status) {
            if !force {
                return Err(ServiceError::InvalidStatus(format!(
                    "{} -> {}",
                    old_status, new_status
                )));
            }
            warn!(
                order_id = %order_id,
                old_status = %old_status,
                new_status = %new_status,
                "Forced order status transition outside the lifecycle table"
            );
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        Ok(updated)
    }
}

/// Timestamp-derived order code with a random suffix, so bursts landing in
/// the same second cannot collide.
fn generate_order_code(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("ORD-{}-{:06X}", now.format("%Y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn order_code_shape() {
        let now = Utc::now();
        let code = generate_order_code(now);

        assert!(code.starts_with("ORD-"));
        // ORD- + 14 digit timestamp + - + 6 hex chars
        assert_eq!(code.len(), 4 + 14 + 1 + 6);
    }

    #[test]
    fn order_codes_vary_within_one_second() {
        let now = Utc::now();
        let codes: HashSet<String> = (0..64).map(|_| generate_order_code(now)).collect();

        // Collisions over 24 random bits in 64 draws are possible but
        // vanishingly unlikely; a run of duplicates means the suffix is
        // broken.
        assert!(codes.len() > 60);
    }
}
