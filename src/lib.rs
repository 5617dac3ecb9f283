//! Storefront back-office core.
//!
//! The heart of this crate is the order fulfillment transaction (cart →
//! order, all-or-nothing) and the return/refund workflow with its
//! append-only audit log. The HTTP layer is thin glue over those services;
//! authentication, catalog management and the rest of the storefront live
//! with external collaborators.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use errors::ServiceError;
use services::{orders::OrderService, returns::ReturnService};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub orders: Arc<OrderService>,
    pub returns: Arc<ReturnService>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let sender = Arc::new(event_sender.clone());

        Self {
            orders: Arc::new(OrderService::new(db.clone(), sender.clone())),
            returns: Arc::new(ReturnService::new(db.clone(), sender)),
            db,
            config,
            event_sender,
        }
    }
}

/// Common query parameters for list endpoints
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

/// Builds the application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/checkout", post(handlers::orders::checkout))
        .route("/orders", get(handlers::orders::list_my_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/admin/orders", get(handlers::orders::list_orders))
        .route(
            "/admin/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route(
            "/returns",
            post(handlers::returns::create_return).get(handlers::returns::list_my_returns),
        )
        .route("/admin/returns", get(handlers::returns::list_returns))
        .route("/admin/returns/:id", get(handlers::returns::get_return_detail))
        .route(
            "/admin/returns/:id/status",
            put(handlers::returns::update_return_status),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
