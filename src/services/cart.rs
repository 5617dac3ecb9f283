use crate::entities::{cart_item, product};
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

/// One cart row joined with the product it references, snapshotted at the
/// moment a fulfillment transaction reads it. Owned exclusively by that
/// transaction; the persisted cart rows stay untouched until `clear`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub available_stock: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Reads the user's cart with current product price and stock.
///
/// Generic over [`ConnectionTrait`] so the read happens on the caller's
/// transaction handle. An empty cart fails the whole fulfillment attempt.
pub async fn load_snapshot<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<CartLine>, ServiceError> {
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .find_also_related(product::Entity)
        .all(conn)
        .await?;

    if rows.is_empty() {
        return Err(ServiceError::EmptyCart);
    }

    rows.into_iter()
        .map(|(item, product)| {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "cart item {} references missing product {}",
                    item.id, item.product_id
                ))
            })?;

            Ok(CartLine {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: product.price,
                available_stock: product.stock_quantity,
            })
        })
        .collect()
}

/// Deletes all of the user's cart rows. Runs on the fulfillment transaction
/// so the cart only empties if the order commits.
pub async fn clear<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64, ServiceError> {
    let result = cart_item::Entity::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;

    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_total_is_quantity_times_unit_price() {
        let line = CartLine {
            product_id: Uuid::new_v4(),
            quantity: 3,
            unit_price: dec!(25000),
            available_stock: 10,
        };

        assert_eq!(line.line_total(), dec!(75000));
    }
}
