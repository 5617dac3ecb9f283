// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{cart_item, coupon, order, order_line, product, shipping_method, OrderStatus},
    events::EventSender,
    AppState,
};

/// Application state backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_config = DbConfig {
            url: "sqlite::memory:".to_string(),
            // An in-memory SQLite database lives and dies with a single
            // connection, so the pool must never rotate it out.
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let cfg = AppConfig {
            database_url: db_config.url.clone(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
        };

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_task = tokio::spawn(storefront_api::events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Sends a request through the router, attaching the identity headers
    /// the upstream gateway would normally resolve.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        user_id: Option<Uuid>,
        role: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(user_id) = user_id {
            builder = builder.header("x-user-id", user_id.to_string());
        }
        if let Some(role) = role {
            builder = builder.header("x-user-role", role);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            price: Set(price),
            stock_quantity: Set(stock),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.db())
        .await
        .expect("failed to seed product");
        id
    }

    pub async fn seed_shipping_method(&self, name: &str, price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        shipping_method::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            price: Set(price),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to seed shipping method");
        id
    }

    /// Seeds a coupon expiring `expires_in_days` from now; pass a negative
    /// number to seed an already-expired coupon.
    pub async fn seed_coupon(
        &self,
        code: &str,
        discount_type: coupon::DiscountType,
        value: Decimal,
        expires_in_days: i64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        coupon::ActiveModel {
            id: Set(id),
            code: Set(code.to_string()),
            discount_type: Set(discount_type),
            value: Set(value),
            expiry_date: Set(Utc::now() + Duration::days(expires_in_days)),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to seed coupon");
        id
    }

    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) {
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("failed to seed cart item");
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(self.db())
            .await
            .expect("failed to read product")
            .expect("product not found")
            .stock_quantity
    }

    pub async fn cart_len(&self, user_id: Uuid) -> u64 {
        cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .count(self.db())
            .await
            .expect("failed to count cart items")
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(self.db())
            .await
            .expect("failed to count orders")
    }

    pub async fn order_line_count(&self) -> u64 {
        order_line::Entity::find()
            .count(self.db())
            .await
            .expect("failed to count order lines")
    }

    /// Walks an order through the regular lifecycle to Completed.
    pub async fn complete_order(&self, order_id: Uuid) {
        for status in [OrderStatus::Shipping, OrderStatus::Completed] {
            self.state
                .orders
                .update_order_status(order_id, status, false)
                .await
                .expect("failed to advance order status");
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
