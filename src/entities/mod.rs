pub mod cart_item;
pub mod coupon;
pub mod order;
pub mod order_line;
pub mod product;
pub mod return_log;
pub mod return_request;
pub mod shipping_method;

pub use cart_item::Entity as CartItem;
pub use coupon::{DiscountType, Entity as Coupon};
pub use order::{Entity as Order, OrderStatus};
pub use order_line::Entity as OrderLine;
pub use product::Entity as Product;
pub use return_log::Entity as ReturnLog;
pub use return_request::{Entity as ReturnRequest, ReturnStatus};
pub use shipping_method::Entity as ShippingMethod;
