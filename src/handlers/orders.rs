use crate::{
    entities::{order, OrderStatus},
    errors::ServiceError,
    handlers::Caller,
    services::orders::{OrderDetail, OrderListPage, PlaceOrderReceipt, PlaceOrderRequest},
    ApiResponse, ApiResult, AppState, ListQuery,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
    pub shipping_method_id: Uuid,
    pub shipping_address: String,
    pub phone: String,
    pub customer_name: Option<String>,
    pub coupon_code: Option<String>,
    pub payment_method: Option<String>,
}

pub async fn checkout(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CheckoutPayload>,
) -> ApiResult<PlaceOrderReceipt> {
    let receipt = state
        .orders
        .place_order(PlaceOrderRequest {
            user_id: caller.user_id,
            shipping_method_id: payload.shipping_method_id,
            shipping_address: payload.shipping_address,
            phone: payload.phone,
            customer_name: payload.customer_name,
            coupon_code: payload.coupon_code,
            payment_method: payload.payment_method,
        })
        .await?;

    Ok(Json(ApiResponse::success(receipt)))
}

pub async fn list_my_orders(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Vec<order::Model>> {
    let orders = state.orders.list_orders_for_user(caller.user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

    if detail.order.user_id != caller.user_id {
        caller.require_admin()?;
    }

    Ok(Json(ApiResponse::success(detail)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<OrderListPage> {
    caller.require_admin()?;

    let page = query.page.max(1);
    let per_page = query.limit.clamp(1, 100);
    let orders = state.orders.list_orders(page, per_page).await?;

    Ok(Json(ApiResponse::success(orders)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusPayload {
    pub status: OrderStatus,
    /// Administrative override for transitions outside the lifecycle table.
    #[serde(default)]
    pub force: bool,
}

pub async fn update_order_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> ApiResult<order::Model> {
    caller.require_admin()?;

    let updated = state
        .orders
        .update_order_status(id, payload.status, payload.force)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}
