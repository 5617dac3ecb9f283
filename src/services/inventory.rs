use crate::entities::product;
use crate::errors::ServiceError;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

/// Decrements a product's stock by the ordered quantity.
///
/// The `stock_quantity >= quantity` filter doubles as the stock check:
/// two fulfillment transactions racing over the same product cannot both
/// get a row update once the counter would pass zero, so the check and the
/// decrement are serialized by the store itself. Zero affected rows means
/// the product sold out underneath us.
pub async fn deduct<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(product_id));
    }

    Ok(())
}
