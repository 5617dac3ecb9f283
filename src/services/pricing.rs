use crate::entities::{coupon, shipping_method};
use crate::errors::ServiceError;
use crate::services::cart::CartLine;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;
use uuid::Uuid;

/// Priced order, before anything is written.
///
/// `grand_total = sub_total + shipping_fee - discount`, and since the
/// discount is clamped to the subtotal the total can never go negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub sub_total: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub grand_total: Decimal,
}

/// Prices a cart snapshot: subtotal, shipping fee by method, optional
/// coupon discount.
///
/// An unresolvable shipping method is a hard failure. An unresolvable or
/// expired coupon is not: the order proceeds undiscounted.
pub async fn quote<C: ConnectionTrait>(
    conn: &C,
    lines: &[CartLine],
    shipping_method_id: Uuid,
    coupon_code: Option<&str>,
) -> Result<Quote, ServiceError> {
    let sub_total: Decimal = lines.iter().map(CartLine::line_total).sum();

    let shipping_fee = resolve_shipping_fee(conn, shipping_method_id).await?;

    let discount = match coupon_code {
        Some(code) => resolve_discount(conn, code, sub_total).await?,
        None => Decimal::ZERO,
    };

    Ok(Quote {
        sub_total,
        shipping_fee,
        discount,
        grand_total: sub_total + shipping_fee - discount,
    })
}

async fn resolve_shipping_fee<C: ConnectionTrait>(
    conn: &C,
    shipping_method_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let method = shipping_method::Entity::find_by_id(shipping_method_id)
        .one(conn)
        .await?
        .ok_or(ServiceError::InvalidShippingMethod(shipping_method_id))?;

    Ok(method.price)
}

/// Resolves a coupon code into a discount amount.
///
/// A promo problem never blocks checkout: unknown and expired codes price
/// as a zero discount, as an ordinary branch rather than an error path.
async fn resolve_discount<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    sub_total: Decimal,
) -> Result<Decimal, ServiceError> {
    let Some(coupon) = coupon::Entity::find()
        .filter(coupon::Column::Code.eq(code))
        .one(conn)
        .await?
    else {
        debug!(code, "coupon not found, pricing without discount");
        return Ok(Decimal::ZERO);
    };

    if coupon.is_expired(Utc::now()) {
        debug!(code, "coupon expired, pricing without discount");
        return Ok(Decimal::ZERO);
    }

    Ok(compute_discount(coupon.discount_type, coupon.value, sub_total))
}

/// Discount arithmetic, clamped to `[0, sub_total]`.
pub fn compute_discount(
    discount_type: coupon::DiscountType,
    value: Decimal,
    sub_total: Decimal,
) -> Decimal {
    let raw = match discount_type {
        coupon::DiscountType::Percent => sub_total * value / Decimal::from(100),
        coupon::DiscountType::Flat => value,
    };

    raw.clamp(Decimal::ZERO, sub_total)
}
