use crate::{
    db::DbPool,
    entities::{order, return_log, return_request, OrderStatus, ReturnStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateReturnRequest {
    pub order_id: Uuid,
    pub reason: Option<String>,
    /// Defaults to the full order total when omitted or non-positive;
    /// always clamped to the order total.
    pub refund_amount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateReturnStatusRequest {
    pub status: ReturnStatus,
    pub note: Option<String>,
    /// When supplied and positive, replaces the stored refund (clamped to
    /// the order total); otherwise the prior amount is retained.
    pub refund_amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ReturnDetail {
    pub request: return_request::Model,
    /// Audit log, newest first.
    pub logs: Vec<return_log::Model>,
}

/// Service owning the return/refund workflow and its audit trail.
///
/// Status changes carry no inventory or monetary side effects: stock is
/// not restocked and no payment is reversed here. The workflow tracks
/// state, and the log is the full history of how it got there.
#[derive(Clone)]
pub struct ReturnService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReturnService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Opens a return request for a completed order owned by the caller.
    ///
    /// The request row and its creation log entry are written in one
    /// transaction, so the audit trail can never miss the first status.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, user_id = %user_id))]
    pub async fn create_return(
        &self,
        user_id: Uuid,
        request: CreateReturnRequest,
    ) -> Result<return_request::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(request.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", request.order_id))
            })?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Order belongs to another customer".to_string(),
            ));
        }

        if order.status != OrderStatus::Completed {
            return Err(ServiceError::OrderNotEligible(format!(
                "only completed orders can be returned (current status: {})",
                order.status
            )));
        }

        let existing = return_request::Entity::find()
            .filter(return_request::Column::OrderId.eq(order.id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateReturn(order.id));
        }

        let refund_amount = clamp_refund(request.refund_amount, order.total_amount);
        let now = Utc::now();
        let return_id = Uuid::new_v4();

        let created = return_request::ActiveModel {
            id: Set(return_id),
            order_id: Set(order.id),
            reason: Set(request.reason.clone()),
            refund_amount: Set(refund_amount),
            status: Set(ReturnStatus::Requested),
            requested_at: Set(now),
            processed_at: Set(None),
            processed_by: Set(None),
        }
        .insert(&txn)
        .await?;

        append_log(
            &txn,
            return_id,
            None,
            ReturnStatus::Requested,
            request.reason,
            Some(user_id),
            now,
        )
        .await?;

        txn.commit().await?;

        info!(
            return_id = %return_id,
            order_id = %order.id,
            refund = %refund_amount,
            "Return request opened"
        );

        self.event_sender
            .send_or_log(Event::ReturnRequested {
                return_id,
                order_id: order.id,
            })
            .await;

        Ok(created)
    }

    /// Moves a return request to a new status, appending the transition to
    /// the audit log in the same transaction.
    ///
    /// Transitions between the four statuses are deliberately unrestricted:
    /// the workflow exists to record what administrators decide, and the
    /// log keeps any unusual path visible.
    #[instrument(skip(self, request), fields(return_id = %return_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        return_id: Uuid,
        request: UpdateReturnStatusRequest,
        actor_id: Uuid,
    ) -> Result<return_request::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let ret = return_request::Entity::find_by_id(return_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Return request {} not found", return_id))
            })?;

        // The order total caps any refund override.
        let order = order::Entity::find_by_id(ret.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "return request {} references missing order {}",
                    return_id, ret.order_id
                ))
            })?;

        let old_status = ret.status;
        let refund_amount = match request.refund_amount {
            Some(amount) if amount > Decimal::ZERO => amount.min(order.total_amount),
            _ => ret.refund_amount,
        };

        let now = Utc::now();
        let mut active: return_request::ActiveModel = ret.into();
        active.status = Set(request.status);
        active.refund_amount = Set(refund_amount);
        active.processed_at = Set(Some(now));
        active.processed_by = Set(Some(actor_id));
        let updated = active.update(&txn).await?;

        append_log(
            &txn,
            return_id,
            Some(old_status),
            request.status,
            request.note,
            Some(actor_id),
            now,
        )
        .await?;

        txn.commit().await?;

        info!(
            return_id = %return_id,
            old_status = %old_status,
            new_status = %request.status,
            "Return status updated"
        );

        self.event_sender
            .send_or_log(Event::ReturnStatusChanged {
                return_id,
                old_status: old_status.to_string(),
                new_status: request.status.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Retrieves a return request with its audit log, newest entry first.
    #[instrument(skip(self), fields(return_id = %return_id))]
    pub async fn get_return_detail(
        &self,
        return_id: Uuid,
    ) -> Result<Option<ReturnDetail>, ServiceError> {
        let db = &*self.db;

        let Some(request) = return_request::Entity::find_by_id(return_id).one(db).await? else {
            return Ok(None);
        };

        let logs = return_log::Entity::find()
            .filter(return_log::Column::ReturnRequestId.eq(return_id))
            .order_by_desc(return_log::Column::ChangedAt)
            .all(db)
            .await?;

        Ok(Some(ReturnDetail { request, logs }))
    }

    /// Lists the return requests attached to a user's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_returns_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<return_request::Model>, ServiceError> {
        let returns = return_request::Entity::find()
            .join(JoinType::InnerJoin, return_request::Relation::Order.def())
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(return_request::Column::RequestedAt)
            .all(&*self.db)
            .await?;

        Ok(returns)
    }

    /// Lists return requests with pagination.
    #[instrument(skip(self))]
    pub async fn list_returns(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<return_request::Model>, u64), ServiceError> {
        let paginator = return_request::Entity::find()
            .order_by_desc(return_request::Column::RequestedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let returns = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((returns, total))
    }
}

/// Refund defaulting and clamping: omitted or non-positive requests fall
/// back to the full order total; nothing may exceed it.
fn clamp_refund(requested: Option<Decimal>, order_total: Decimal) -> Decimal {
    match requested {
        Some(amount) if amount > Decimal::ZERO => amount.min(order_total),
        _ => order_total,
    }
}

async fn append_log<C: ConnectionTrait>(
    conn: &C,
    return_request_id: Uuid,
    old_status: Option<ReturnStatus>,
    new_status: ReturnStatus,
    note: Option<String>,
    changed_by: Option<Uuid>,
    changed_at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    return_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        return_request_id: Set(return_request_id),
        old_status: Set(old_status),
        new_status: Set(new_status),
        note: Set(note),
        changed_by: Set(changed_by),
        changed_at: Set(changed_at),
    }
    .insert(conn)
    .await?;

    Ok(())
}
